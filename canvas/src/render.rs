//! Rendering: draws stroke segments to a 2D context.
//!
//! [`Renderer`] is the seam between the drawing state machine and pixels.
//! [`Canvas2dRenderer`] is the only place that touches
//! [`web_sys::CanvasRenderingContext2d`]; tests substitute a recording
//! renderer.

use protocol::StrokeSegment;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::consts::{STROKE_LINE_CAP, STROKE_LINE_JOIN, STROKE_LINE_WIDTH};

/// Drawing primitives the surface needs.
pub trait Renderer {
    /// Stroke one straight segment. `segment.color` is always set by the caller.
    fn draw_segment(&mut self, segment: &StrokeSegment);

    /// Erase everything.
    fn clear(&mut self);
}

/// Renderer backed by a browser canvas element.
pub struct Canvas2dRenderer {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl Canvas2dRenderer {
    /// Wrap a canvas and its 2D context, applying the stroke style.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, ctx: CanvasRenderingContext2d) -> Self {
        ctx.set_line_width(STROKE_LINE_WIDTH);
        ctx.set_line_cap(STROKE_LINE_CAP);
        ctx.set_line_join(STROKE_LINE_JOIN);
        ctx.set_image_smoothing_enabled(false);
        Self { canvas, ctx }
    }
}

impl Renderer for Canvas2dRenderer {
    fn draw_segment(&mut self, segment: &StrokeSegment) {
        self.ctx.begin_path();
        self.ctx.set_stroke_style_str(segment.color_or_default());
        self.ctx.move_to(segment.x1, segment.y1);
        self.ctx.line_to(segment.x2, segment.y2);
        self.ctx.stroke();
    }

    fn clear(&mut self) {
        let width = f64::from(self.canvas.width());
        let height = f64::from(self.canvas.height());
        self.ctx.clear_rect(0.0, 0.0, width, height);
        self.ctx.begin_path();
    }
}
