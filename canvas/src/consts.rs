//! Shared numeric and DOM constants for the canvas crate.

// ── Stroke style ────────────────────────────────────────────────

/// Line width for every rendered segment, in bitmap pixels.
pub const STROKE_LINE_WIDTH: f64 = 3.0;

/// Line cap and join used for freehand strokes.
pub const STROKE_LINE_CAP: &str = "round";
pub const STROKE_LINE_JOIN: &str = "round";

// ── Host element ────────────────────────────────────────────────

/// Element id the surface mounts on when the host passes none.
pub const DEFAULT_CANVAS_ID: &str = "drawing-canvas";

/// Attribute on the canvas element carrying the whiteboard id.
pub const WHITEBOARD_ID_ATTR: &str = "data-whiteboard-id";

/// Attribute the surface writes its connection status into.
pub const CONNECTION_STATUS_ATTR: &str = "data-connection-status";

/// Canvas bitmap height as a fraction of the window's inner height.
pub const CANVAS_HEIGHT_FRACTION: f64 = 0.6;

// ── Connection ──────────────────────────────────────────────────

/// Path of the broadcast channel websocket endpoint.
pub const WS_PATH: &str = "/api/ws";

/// First reconnect delay.
pub const RECONNECT_INITIAL_MS: u32 = 1000;

/// Reconnect delay cap; the delay doubles until it reaches this.
pub const RECONNECT_MAX_MS: u32 = 10_000;
