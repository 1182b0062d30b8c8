//! Whiteboard directory: identity and existence of whiteboards.
//!
//! DESIGN
//! ======
//! The broadcast channel consults the directory only at join time: to check
//! that a requested whiteboard exists, or to resolve the default whiteboard
//! when no id is given. The HTTP routes use the same trait for list, show and
//! create. Two implementations exist: Postgres (when `DATABASE_URL` is set)
//! and an in-memory store with identical id semantics.
//!
//! Ids are positive integers rendered as strings. A requested id that does not
//! parse as an integer is treated as "not found", never as an error.

use std::collections::BTreeMap;

use async_trait::async_trait;
use protocol::{ErrorCode, WhiteboardId};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::info;

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 200;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("whiteboard not found: {0}")]
    NotFound(WhiteboardId),
    #[error("invalid whiteboard: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for DirectoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_WHITEBOARD_NOT_FOUND",
            Self::Invalid(_) => "E_INVALID_WHITEBOARD",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Whiteboard metadata. Mirrors the `whiteboards` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Whiteboard {
    pub id: WhiteboardId,
    pub name: String,
    pub description: Option<String>,
}

/// Fields accepted when creating a whiteboard.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWhiteboard {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewWhiteboard {
    #[cfg(test)]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None }
    }

    /// Trim fields and enforce length limits.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Invalid`] naming the first violated rule.
    pub fn validated(self) -> Result<Self, DirectoryError> {
        let name = self.name.trim().to_owned();
        let name_len = name.chars().count();
        if name_len == 0 {
            return Err(DirectoryError::Invalid("name can't be blank".into()));
        }
        if name_len < NAME_MIN_CHARS {
            return Err(DirectoryError::Invalid(format!(
                "name is too short (minimum is {NAME_MIN_CHARS} characters)"
            )));
        }
        if name_len > NAME_MAX_CHARS {
            return Err(DirectoryError::Invalid(format!(
                "name is too long (maximum is {NAME_MAX_CHARS} characters)"
            )));
        }

        let description = self
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        if description
            .as_ref()
            .is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_CHARS)
        {
            return Err(DirectoryError::Invalid(format!(
                "description is too long (maximum is {DESCRIPTION_MAX_CHARS} characters)"
            )));
        }

        Ok(Self { name, description })
    }
}

/// Whiteboard identity lookups consumed by the channel and HTTP routes.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a whiteboard by id. `Ok(None)` when it does not exist.
    async fn find_whiteboard(&self, id: &WhiteboardId) -> Result<Option<Whiteboard>, DirectoryError>;

    /// Return the first whiteboard, creating the fallback one if none exist.
    async fn default_whiteboard(&self) -> Result<Whiteboard, DirectoryError>;

    async fn create_whiteboard(&self, new: NewWhiteboard) -> Result<Whiteboard, DirectoryError>;

    async fn list_whiteboards(&self) -> Result<Vec<Whiteboard>, DirectoryError>;
}

fn parse_row_id(id: &WhiteboardId) -> Option<i64> {
    id.as_str().parse::<i64>().ok().filter(|n| *n > 0)
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgDirectory {
    pool: PgPool,
    default_name: String,
}

impl PgDirectory {
    #[must_use]
    pub fn new(pool: PgPool, default_name: impl Into<String>) -> Self {
        Self { pool, default_name: default_name.into() }
    }

    async fn first_whiteboard(&self) -> Result<Option<Whiteboard>, sqlx::Error> {
        let row = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT id, name, description FROM whiteboards ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_whiteboard))
    }
}

fn row_to_whiteboard((id, name, description): (i64, String, Option<String>)) -> Whiteboard {
    Whiteboard { id: WhiteboardId::from(id), name, description }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn find_whiteboard(&self, id: &WhiteboardId) -> Result<Option<Whiteboard>, DirectoryError> {
        let Some(row_id) = parse_row_id(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT id, name, description FROM whiteboards WHERE id = $1",
        )
        .bind(row_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_whiteboard))
    }

    async fn default_whiteboard(&self) -> Result<Whiteboard, DirectoryError> {
        if let Some(existing) = self.first_whiteboard().await? {
            return Ok(existing);
        }

        sqlx::query("INSERT INTO whiteboards (name) VALUES ($1)")
            .bind(&self.default_name)
            .execute(&self.pool)
            .await?;

        // Re-select so concurrent creators converge on the lowest id.
        let first = self
            .first_whiteboard()
            .await?
            .ok_or_else(|| DirectoryError::Invalid("default whiteboard vanished after insert".into()))?;
        info!(whiteboard_id = %first.id, "created default whiteboard");
        Ok(first)
    }

    async fn create_whiteboard(&self, new: NewWhiteboard) -> Result<Whiteboard, DirectoryError> {
        let new = new.validated()?;
        let row = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "INSERT INTO whiteboards (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_whiteboard(row))
    }

    async fn list_whiteboards(&self) -> Result<Vec<Whiteboard>, DirectoryError> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT id, name, description FROM whiteboards ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_whiteboard).collect())
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Process-local directory. Ids start at 1 and are never reused.
pub struct MemoryDirectory {
    inner: Mutex<MemoryInner>,
    default_name: String,
}

struct MemoryInner {
    next_id: i64,
    boards: BTreeMap<i64, Whiteboard>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new(default_name: impl Into<String>) -> Self {
        Self { inner: Mutex::new(MemoryInner { next_id: 1, boards: BTreeMap::new() }), default_name: default_name.into() }
    }
}

impl MemoryInner {
    fn insert(&mut self, name: String, description: Option<String>) -> Whiteboard {
        let id = self.next_id;
        self.next_id += 1;
        let board = Whiteboard { id: WhiteboardId::from(id), name, description };
        self.boards.insert(id, board.clone());
        board
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_whiteboard(&self, id: &WhiteboardId) -> Result<Option<Whiteboard>, DirectoryError> {
        let Some(row_id) = parse_row_id(id) else {
            return Ok(None);
        };
        Ok(self.inner.lock().await.boards.get(&row_id).cloned())
    }

    async fn default_whiteboard(&self) -> Result<Whiteboard, DirectoryError> {
        let mut inner = self.inner.lock().await;
        if let Some(first) = inner.boards.values().next() {
            return Ok(first.clone());
        }
        let board = inner.insert(self.default_name.clone(), None);
        info!(whiteboard_id = %board.id, "created default whiteboard");
        Ok(board)
    }

    async fn create_whiteboard(&self, new: NewWhiteboard) -> Result<Whiteboard, DirectoryError> {
        let new = new.validated()?;
        Ok(self.inner.lock().await.insert(new.name, new.description))
    }

    async fn list_whiteboards(&self) -> Result<Vec<Whiteboard>, DirectoryError> {
        Ok(self.inner.lock().await.boards.values().cloned().collect())
    }
}

#[cfg(test)]
#[path = "directory_test.rs"]
mod tests;
