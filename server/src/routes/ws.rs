//! WebSocket handler: broadcast channel transport.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID and enters a `select!` loop:
//! - Incoming client text frames → decode once → subscribe / unsubscribe /
//!   publish
//! - Broadcasts from partition peers → forward to client
//!
//! Inbound handling is split from the socket so tests can drive it with plain
//! channels. It returns the messages owed to the sender (confirm or reject);
//! broadcasts to peers go through the channel service.
//!
//! The per-connection queue outlives any one subscription. Leaving a
//! partition discards whatever it already queued, so a connection that moves
//! to another whiteboard never sees strokes from the one it left.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → allocate per-connection outbound queue
//! 2. Client subscribes → `confirm_subscription` or `reject_subscription`
//! 3. Client publishes → fan-out to the joined partition, sender excluded
//! 4. Close → leave partition

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::channel::{self, Subscription};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();

    // Per-connection queue for broadcasts from partition peers.
    let mut queue = ClientQueue::new(state.channel_capacity);

    info!(%conn_id, "ws: client connected");

    let mut subscription: Option<Subscription> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut subscription, conn_id, &mut queue, text.as_str()).await;
                        if send_all(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(message) = queue.rx.recv() => {
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(sub) = subscription.take() {
        channel::leave(&state, &sub).await;
    }
    info!(%conn_id, "ws: client disconnected");
}

// =============================================================================
// QUEUE
// =============================================================================

/// Both ends of a connection's broadcast queue. The sender is cloned into
/// each partition the connection joins; the receiver feeds the socket.
pub(crate) struct ClientQueue {
    pub(crate) tx: mpsc::Sender<ServerMessage>,
    pub(crate) rx: mpsc::Receiver<ServerMessage>,
}

impl ClientQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx }
    }

    /// Drop everything queued so far. Returns how many messages were discarded.
    fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Leave the current partition and discard broadcasts it already queued.
///
/// Publish fans out under the partition read lock and `leave` takes the write
/// lock, so once `leave` returns nothing more from the old partition can land
/// in the queue.
async fn leave_current(state: &AppState, subscription: &mut Option<Subscription>, conn_id: Uuid, queue: &mut ClientQueue) {
    let Some(previous) = subscription.take() else {
        return;
    };
    channel::leave(state, &previous).await;
    let discarded = queue.discard_pending();
    if discarded > 0 {
        debug!(%conn_id, whiteboard_id = %previous.whiteboard_id, discarded, "ws: discarded broadcasts from left partition");
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode and handle one inbound text frame. Returns messages for the sender.
///
/// Malformed frames are dropped and the connection is kept.
pub(crate) async fn process_inbound_text(
    state: &AppState,
    subscription: &mut Option<Subscription>,
    conn_id: Uuid,
    queue: &mut ClientQueue,
    text: &str,
) -> Vec<ServerMessage> {
    let message = match ClientMessage::decode(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(%conn_id, error = %e, "ws: dropping malformed frame");
            return Vec::new();
        }
    };

    match message {
        ClientMessage::Subscribe { whiteboard_id } => {
            // One partition per connection: a new join replaces the old one.
            leave_current(state, subscription, conn_id, queue).await;
            match channel::join(state, whiteboard_id.as_ref(), conn_id, queue.tx.clone()).await {
                Ok(sub) => {
                    let confirm = ServerMessage::Confirmed { whiteboard_id: sub.whiteboard_id.clone() };
                    *subscription = Some(sub);
                    vec![confirm]
                }
                Err(e) => {
                    warn!(%conn_id, requested = ?whiteboard_id, error = %e, "ws: subscription rejected");
                    vec![ServerMessage::rejection(whiteboard_id, &e)]
                }
            }
        }
        ClientMessage::Unsubscribe => {
            leave_current(state, subscription, conn_id, queue).await;
            Vec::new()
        }
        ClientMessage::Publish { whiteboard_id, drawing_data } => {
            match subscription.as_ref() {
                Some(sub) if sub.whiteboard_id == whiteboard_id => {
                    channel::publish(state, &sub.whiteboard_id, &drawing_data, Some(conn_id)).await;
                }
                Some(sub) => {
                    warn!(%conn_id, joined = %sub.whiteboard_id, target = %whiteboard_id, "ws: publish to foreign whiteboard dropped");
                }
                None => {
                    warn!(%conn_id, target = %whiteboard_id, "ws: publish before join dropped");
                }
            }
            Vec::new()
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    if let ServerMessage::Rejected { code, message: reason, .. } = message {
        warn!(code = %code, reason = %reason, "ws: send reject_subscription");
    }
    socket.send(Message::Text(message.encode().into())).await
}

async fn send_all(socket: &mut WebSocket, messages: &[ServerMessage]) -> Result<(), axum::Error> {
    for message in messages {
        send_message(socket, message).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
