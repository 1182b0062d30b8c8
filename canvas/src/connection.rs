//! Connection lifecycle: join handshake, inbound routing, reconnect policy.
//!
//! `ConnectionCore` is transport-agnostic. The browser transport and the CLI
//! both drive it with the same calls: `on_open` when a socket is up,
//! `on_text` for every inbound frame, `outbound` to encode local drawing and
//! `on_closed` when the socket drops.
//!
//! ERROR HANDLING
//! ==============
//! A `reject_subscription` is terminal: `on_text` returns
//! [`ConnectionError::Rejected`], the status becomes `Rejected` and
//! `on_closed` stops offering reconnect delays. Frames that fail to decode
//! are returned as [`ConnectionError::Codec`] for the caller to log and drop.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::time::Duration;

use protocol::{ClientMessage, CodecError, DrawingData, ServerMessage, WhiteboardId};

use crate::consts::{RECONNECT_INITIAL_MS, RECONNECT_MAX_MS, WS_PATH};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("undecodable frame: {0}")]
    Codec(#[from] CodecError),
    #[error("subscription rejected ({code}): {message}")]
    Rejected { code: String, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

/// Observable connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The server refused the whiteboard. Drawing stays disabled.
    Rejected,
}

impl ConnectionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Rejected => "rejected",
        }
    }
}

/// Inbound frame after routing.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The join succeeded on the given (resolved) whiteboard.
    Joined(WhiteboardId),
    /// A peer's drawing payload to replay on the surface.
    Remote(DrawingData),
}

// =============================================================================
// BACKOFF
// =============================================================================

/// Exponential reconnect delay: doubles from `initial_ms` up to `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial_ms: u32,
    max_ms: u32,
    current_ms: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RECONNECT_INITIAL_MS, RECONNECT_MAX_MS)
    }
}

impl Backoff {
    #[must_use]
    pub fn new(initial_ms: u32, max_ms: u32) -> Self {
        let initial_ms = initial_ms.max(1);
        Self { initial_ms, max_ms: max_ms.max(initial_ms), current_ms: initial_ms }
    }

    /// Delay before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_ms;
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
        Duration::from_millis(u64::from(delay))
    }

    pub fn reset(&mut self) {
        self.current_ms = self.initial_ms;
    }
}

// =============================================================================
// CONNECTION CORE
// =============================================================================

/// Per-client connection state shared by every transport.
#[derive(Debug, Clone)]
pub struct ConnectionCore {
    requested: Option<WhiteboardId>,
    joined: Option<WhiteboardId>,
    status: ConnectionStatus,
    backoff: Backoff,
}

impl ConnectionCore {
    /// `None` asks the server for its default whiteboard.
    #[must_use]
    pub fn new(requested: Option<WhiteboardId>) -> Self {
        Self { requested, joined: None, status: ConnectionStatus::Disconnected, backoff: Backoff::default() }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whiteboard confirmed by the server for the current socket.
    #[must_use]
    pub fn joined(&self) -> Option<&WhiteboardId> {
        self.joined.as_ref()
    }

    #[must_use]
    pub fn requested(&self) -> Option<&WhiteboardId> {
        self.requested.as_ref()
    }

    /// A transport attempt is starting.
    pub fn on_connecting(&mut self) {
        if self.status != ConnectionStatus::Rejected {
            self.status = ConnectionStatus::Connecting;
        }
    }

    /// The socket is open. Returns the subscribe frame to send first.
    #[must_use]
    pub fn on_open(&mut self) -> String {
        self.joined = None;
        self.status = ConnectionStatus::Connecting;
        ClientMessage::Subscribe { whiteboard_id: self.requested.clone() }.encode()
    }

    /// Route one inbound text frame.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Rejected`] when the server refuses the join, and
    /// [`ConnectionError::Codec`] when the frame matches no known shape.
    pub fn on_text(&mut self, text: &str) -> Result<Option<Inbound>, ConnectionError> {
        match ServerMessage::decode(text)? {
            ServerMessage::Confirmed { whiteboard_id } => {
                self.status = ConnectionStatus::Connected;
                self.backoff.reset();
                self.joined = Some(whiteboard_id.clone());
                log::info!("joined whiteboard {whiteboard_id}");
                Ok(Some(Inbound::Joined(whiteboard_id)))
            }
            ServerMessage::Rejected { code, message, .. } => {
                self.status = ConnectionStatus::Rejected;
                self.joined = None;
                Err(ConnectionError::Rejected { code, message })
            }
            ServerMessage::Broadcast(data) => {
                if self.joined.is_none() {
                    log::debug!("dropping broadcast received before join");
                    return Ok(None);
                }
                Ok(Some(Inbound::Remote(data)))
            }
        }
    }

    /// Encode a local drawing payload under the joined whiteboard id.
    ///
    /// `None` while not joined: payloads produced offline are dropped, not
    /// queued for later.
    #[must_use]
    pub fn outbound(&self, data: DrawingData) -> Option<String> {
        let whiteboard_id = self.joined.clone()?;
        Some(ClientMessage::Publish { whiteboard_id, drawing_data: data }.encode())
    }

    /// The socket dropped. Returns the delay before reconnecting, or `None`
    /// when the connection must not be retried.
    pub fn on_closed(&mut self) -> Option<Duration> {
        self.joined = None;
        if self.status == ConnectionStatus::Rejected {
            return None;
        }
        self.status = ConnectionStatus::Disconnected;
        Some(self.backoff.next_delay())
    }
}

/// Build the broadcast channel URL from the page's location.
#[must_use]
pub fn websocket_url(page_href: &str, host: &str) -> String {
    let scheme = if page_href.starts_with("https") { "wss" } else { "ws" };
    format!("{scheme}://{host}{WS_PATH}")
}
