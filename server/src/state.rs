//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the whiteboard directory and a map of live partitions. Each
//! partition is the set of connections currently joined to one whiteboard.
//! Partitions exist only while they have members; nothing drawn is stored.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{ServerMessage, WhiteboardId};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::services::directory::Directory;

// =============================================================================
// PARTITION STATE
// =============================================================================

/// Live members of one whiteboard partition.
#[derive(Default)]
pub struct PartitionState {
    /// Joined connections: `conn_id` -> sender for outgoing messages.
    pub clients: HashMap<Uuid, mpsc::Sender<ServerMessage>>,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. All inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn Directory>,
    pub partitions: Arc<RwLock<HashMap<WhiteboardId, PartitionState>>>,
    /// Per-connection outbound queue depth.
    pub channel_capacity: usize,
}

impl AppState {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, channel_capacity: usize) -> Self {
        Self { directory, partitions: Arc::new(RwLock::new(HashMap::new())), channel_capacity: channel_capacity.max(1) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
