#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

/// A point in either client (CSS) or bitmap space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry of the canvas element at the time of an input event.
///
/// `left` / `top` / `display_*` come from the element's bounding client rect
/// (CSS pixels). `bitmap_*` are the canvas `width` / `height` attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub display_width: f64,
    pub display_height: f64,
    pub bitmap_width: f64,
    pub bitmap_height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { left: 0.0, top: 0.0, display_width: 1.0, display_height: 1.0, bitmap_width: 1.0, bitmap_height: 1.0 }
    }
}

impl Viewport {
    /// Viewport whose bitmap matches its displayed size, anchored at the origin.
    #[must_use]
    pub fn unscaled(width: f64, height: f64) -> Self {
        Self { left: 0.0, top: 0.0, display_width: width, display_height: height, bitmap_width: width, bitmap_height: height }
    }

    /// Horizontal bitmap pixels per CSS pixel.
    #[must_use]
    pub fn scale_x(&self) -> f64 {
        axis_scale(self.bitmap_width, self.display_width)
    }

    /// Vertical bitmap pixels per CSS pixel.
    #[must_use]
    pub fn scale_y(&self) -> f64 {
        axis_scale(self.bitmap_height, self.display_height)
    }

    /// Convert a client-space point (CSS pixels) to bitmap coordinates.
    #[must_use]
    pub fn client_to_bitmap(&self, client: Point) -> Point {
        Point {
            x: (client.x - self.left) * self.scale_x(),
            y: (client.y - self.top) * self.scale_y(),
        }
    }
}

/// A collapsed or hidden element reports a zero display size; map 1:1 then.
fn axis_scale(bitmap: f64, display: f64) -> f64 {
    if display > 0.0 && display.is_finite() && bitmap.is_finite() {
        bitmap / display
    } else {
        1.0
    }
}
