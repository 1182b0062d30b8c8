mod config;
mod db;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::services::directory::{Directory, MemoryDirectory, PgDirectory};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to read .env: {e}");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drawboard=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env();

    let directory: Arc<dyn Directory> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            tracing::info!(max_connections = config.db_max_connections, "whiteboard directory backed by postgres");
            Arc::new(PgDirectory::new(pool, config.default_whiteboard_name.clone()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; whiteboards are kept in memory and lost on restart");
            Arc::new(MemoryDirectory::new(config.default_whiteboard_name.clone()))
        }
    };

    let state = state::AppState::new(directory, config.channel_capacity);

    let app = routes::app(state);
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "drawboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
