//! Server configuration parsed from environment variables.
//!
//! Every value has a default so the server starts with an empty environment.
//! Without `DATABASE_URL` the whiteboard directory is kept in memory.

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_WHITEBOARD_NAME: &str = "Default Whiteboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Outbound queue depth per connection. A full queue drops broadcasts
    /// for that connection only.
    pub channel_capacity: usize,
    pub default_whiteboard_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            default_whiteboard_name: DEFAULT_WHITEBOARD_NAME.to_owned(),
        }
    }
}

impl ServerConfig {
    /// Build typed config from the process environment.
    ///
    /// Optional:
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: in-memory directory when absent
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `CHANNEL_CAPACITY`: default 256
    /// - `DEFAULT_WHITEBOARD_NAME`: default `Default Whiteboard`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(non_empty("PORT"), defaults.port),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or(non_empty("DB_MAX_CONNECTIONS"), defaults.db_max_connections),
            channel_capacity: parse_or(non_empty("CHANNEL_CAPACITY"), defaults.channel_capacity).max(1),
            default_whiteboard_name: non_empty("DEFAULT_WHITEBOARD_NAME").unwrap_or(defaults.default_whiteboard_name),
        }
    }

    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
