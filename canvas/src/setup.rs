//! Host element discovery and canvas sizing.
//!
//! Setup failures are fatal to the surface: nothing is mounted, drawing stays
//! unavailable, and the error is reported once. They are never retried.

#[cfg(test)]
#[path = "setup_test.rs"]
mod setup_test;

use protocol::WhiteboardId;

use crate::consts::CANVAS_HEIGHT_FRACTION;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("no browser window or document")]
    NoDocument,
    #[error("canvas element `{0}` not found")]
    MissingCanvas(String),
    #[error("element `{0}` is not a canvas")]
    NotCanvas(String),
    #[error("canvas has no 2d rendering context")]
    NoContext,
    #[error("canvas is missing the `data-whiteboard-id` attribute")]
    MissingWhiteboardId,
    #[error("failed to attach `{0}` listener")]
    Listener(String),
}

/// Resolve the whiteboard id from the host attribute. Absent and blank
/// values are both setup failures.
///
/// # Errors
///
/// [`SetupError::MissingWhiteboardId`] when there is no usable id.
pub fn whiteboard_id_from_attribute(value: Option<String>) -> Result<WhiteboardId, SetupError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => Ok(WhiteboardId::new(raw.trim())),
        _ => Err(SetupError::MissingWhiteboardId),
    }
}

/// Bitmap size for the canvas: full container width, a fixed fraction of the
/// window height. Degenerate inputs collapse to 1px so mapping stays finite.
#[must_use]
pub fn bitmap_size(container_width: i32, inner_height: f64) -> (u32, u32) {
    let width = u32::try_from(container_width.max(1)).unwrap_or(1);
    let height = if inner_height.is_finite() && inner_height > 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let h = (inner_height * CANVAS_HEIGHT_FRACTION).floor() as u32;
        h.max(1)
    } else {
        1
    };
    (width, height)
}
