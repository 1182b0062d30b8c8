//! Broadcast channel: per-whiteboard membership and fan-out.
//!
//! DESIGN
//! ======
//! The registry in `AppState::partitions` maps a whiteboard id to the set of
//! connections joined to it. Each connection owns its `Subscription`; the
//! registry only holds a sender clone keyed by connection id.
//!
//! Publish takes the read lock and uses `try_send` on every member's bounded
//! queue, so a slow peer never blocks the publisher or other peers. Members
//! whose queue is closed are collected and removed afterwards under the write
//! lock. Partitions are dropped as soon as their last member leaves.
//!
//! ERROR HANDLING
//! ==============
//! Join consults the directory. An unknown id is a `JoinError::NotFound`;
//! the caller turns it into a `reject_subscription` message and the
//! connection stays open with no membership.

use protocol::{DrawingData, ErrorCode, ServerMessage, WhiteboardId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::directory::DirectoryError;
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("whiteboard not found: {0}")]
    NotFound(WhiteboardId),
    #[error("directory unavailable: {0}")]
    Directory(#[from] DirectoryError),
}

impl ErrorCode for JoinError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_WHITEBOARD_NOT_FOUND",
            Self::Directory(_) => "E_DIRECTORY",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::NotFound(_) => false,
            Self::Directory(e) => e.retryable(),
        }
    }
}

/// Membership handle owned by one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub whiteboard_id: WhiteboardId,
    pub conn_id: Uuid,
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Resolve the requested whiteboard and register `conn_id` in its partition.
///
/// `None` joins the default whiteboard, creating it if the directory is empty.
///
/// # Errors
///
/// Returns [`JoinError::NotFound`] for an unknown id, or
/// [`JoinError::Directory`] when the lookup itself fails.
pub async fn join(
    state: &AppState,
    requested: Option<&WhiteboardId>,
    conn_id: Uuid,
    tx: mpsc::Sender<ServerMessage>,
) -> Result<Subscription, JoinError> {
    let whiteboard = match requested {
        Some(id) => state
            .directory
            .find_whiteboard(id)
            .await?
            .ok_or_else(|| JoinError::NotFound(id.clone()))?,
        None => state.directory.default_whiteboard().await?,
    };

    let mut partitions = state.partitions.write().await;
    let partition = partitions.entry(whiteboard.id.clone()).or_default();
    partition.clients.insert(conn_id, tx);
    info!(whiteboard_id = %whiteboard.id, %conn_id, members = partition.clients.len(), "client joined whiteboard");

    Ok(Subscription { whiteboard_id: whiteboard.id, conn_id })
}

/// Remove a membership. Leaving twice, or after the partition is gone, is a no-op.
pub async fn leave(state: &AppState, subscription: &Subscription) {
    let mut partitions = state.partitions.write().await;
    let Some(partition) = partitions.get_mut(&subscription.whiteboard_id) else {
        return;
    };
    if partition.clients.remove(&subscription.conn_id).is_none() {
        return;
    }
    info!(
        whiteboard_id = %subscription.whiteboard_id,
        conn_id = %subscription.conn_id,
        remaining = partition.clients.len(),
        "client left whiteboard"
    );

    if partition.clients.is_empty() {
        partitions.remove(&subscription.whiteboard_id);
        debug!(whiteboard_id = %subscription.whiteboard_id, "dropped empty partition");
    }
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Fan a drawing payload out to every member of the partition except `exclude`.
///
/// Returns the number of members the message was queued for.
pub async fn publish(
    state: &AppState,
    whiteboard_id: &WhiteboardId,
    data: &DrawingData,
    exclude: Option<Uuid>,
) -> usize {
    let message = ServerMessage::Broadcast(data.clone());
    let mut delivered = 0;
    let mut closed = Vec::new();

    {
        let partitions = state.partitions.read().await;
        let Some(partition) = partitions.get(whiteboard_id) else {
            return 0;
        };

        for (conn_id, tx) in &partition.clients {
            if exclude == Some(*conn_id) {
                continue;
            }
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%whiteboard_id, %conn_id, "subscriber queue full; dropping message");
                }
                Err(TrySendError::Closed(_)) => closed.push(*conn_id),
            }
        }
    }

    if !closed.is_empty() {
        prune_closed(state, whiteboard_id, &closed).await;
    }
    delivered
}

async fn prune_closed(state: &AppState, whiteboard_id: &WhiteboardId, closed: &[Uuid]) {
    let mut partitions = state.partitions.write().await;
    let Some(partition) = partitions.get_mut(whiteboard_id) else {
        return;
    };
    for conn_id in closed {
        // Only drop the member if its sender is still the closed one.
        if partition.clients.get(conn_id).is_some_and(mpsc::Sender::is_closed) {
            partition.clients.remove(conn_id);
            info!(%whiteboard_id, %conn_id, "removed closed subscriber");
        }
    }
    if partition.clients.is_empty() {
        partitions.remove(whiteboard_id);
        debug!(%whiteboard_id, "dropped empty partition");
    }
}

/// Current number of members joined to a whiteboard.
#[cfg(test)]
pub async fn member_count(state: &AppState, whiteboard_id: &WhiteboardId) -> usize {
    state
        .partitions
        .read()
        .await
        .get(whiteboard_id)
        .map_or(0, |p| p.clients.len())
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
