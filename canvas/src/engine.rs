use protocol::{DEFAULT_STROKE_COLOR, DrawingData, StrokeSegment};

use crate::input::{InputArbiter, InputEvent, InputSupport, Phase};
use crate::render::Renderer;
use crate::viewport::{Point, Viewport};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Publish a drawing payload to the whiteboard.
    Send(DrawingData),
    /// Route further events for this pointer to the canvas.
    CapturePointer(i32),
    /// Undo a previous capture.
    ReleasePointer(i32),
}

/// Drawing state machine. `Drawing` carries the last cursor in bitmap space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing {
        last: Point,
        /// Pointer captured at stroke start, if the event carried one.
        captured: Option<i32>,
    },
}

/// Surface state: all logic that doesn't depend on the canvas element.
///
/// Generic over the renderer so it can be tested without a browser.
pub struct SurfaceCore<R: Renderer> {
    renderer: R,
    viewport: Viewport,
    input: InputArbiter,
    state: DrawState,
    color: String,
    enabled: bool,
}

impl<R: Renderer> SurfaceCore<R> {
    #[must_use]
    pub fn new(renderer: R, viewport: Viewport, support: InputSupport, color: impl Into<String>) -> Self {
        Self { renderer, viewport, input: InputArbiter::new(support), state: DrawState::Idle, color: color.into(), enabled: true }
    }

    // --- Geometry ---

    /// Replace the canvas geometry used for coordinate mapping.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    // --- Local input ---

    /// Feed one raw input event through source arbitration and the state machine.
    ///
    /// While a stroke holds a pointer capture, events from any other pointer
    /// are ignored before they reach the arbiter, so a second finger can
    /// neither steer nor end the stroke.
    pub fn handle_input(&mut self, event: &InputEvent) -> Vec<Action> {
        if self.is_foreign_pointer(event.pointer_id) {
            return Vec::new();
        }
        if !self.input.admit(event) {
            return Vec::new();
        }
        match event.phase {
            Phase::Down => self.pointer_down(event.client, event.pointer_id),
            Phase::Move => self.pointer_move(event.client),
            Phase::Up | Phase::Out | Phase::Cancel => self.pointer_up(),
        }
    }

    /// Idle → Drawing. Records the cursor; emits nothing to the network.
    pub fn pointer_down(&mut self, client: Point, pointer_id: Option<i32>) -> Vec<Action> {
        if !self.enabled {
            return Vec::new();
        }
        if self.is_foreign_pointer(pointer_id) {
            return Vec::new();
        }

        let last = self.viewport.client_to_bitmap(client);
        self.state = DrawState::Drawing { last, captured: pointer_id };
        pointer_id.map(Action::CapturePointer).into_iter().collect()
    }

    /// Drawing → Drawing. Renders last→new immediately and emits the segment.
    pub fn pointer_move(&mut self, client: Point) -> Vec<Action> {
        let DrawState::Drawing { last, captured } = self.state else {
            return Vec::new();
        };
        let next = self.viewport.client_to_bitmap(client);
        let segment = StrokeSegment::new(last.x, last.y, next.x, next.y, self.color.clone());
        self.renderer.draw_segment(&segment);
        self.state = DrawState::Drawing { last: next, captured };
        vec![Action::Send(DrawingData::Segment(segment))]
    }

    /// Drawing → Idle on up / out / cancel. Emits nothing to the network.
    pub fn pointer_up(&mut self) -> Vec<Action> {
        let previous = std::mem::take(&mut self.state);
        match previous {
            DrawState::Drawing { captured: Some(id), .. } => vec![Action::ReleasePointer(id)],
            DrawState::Drawing { captured: None, .. } | DrawState::Idle => Vec::new(),
        }
    }

    /// Erase locally and announce the clear to peers.
    pub fn clear_local(&mut self) -> Vec<Action> {
        if !self.enabled {
            return Vec::new();
        }
        self.renderer.clear();
        vec![Action::Send(DrawingData::Clear)]
    }

    // --- Remote input ---

    /// Render a payload received from a peer. Never re-emits and never
    /// touches the local stroke in progress.
    pub fn apply_remote(&mut self, data: &DrawingData) {
        match data {
            DrawingData::Segment(segment) => {
                if segment.color.is_some() {
                    self.renderer.draw_segment(segment);
                } else {
                    let colored = StrokeSegment { color: Some(DEFAULT_STROKE_COLOR.to_owned()), ..segment.clone() };
                    self.renderer.draw_segment(&colored);
                }
            }
            DrawingData::Clear => self.renderer.clear(),
        }
    }

    // --- Enable / disable ---

    /// Stop accepting local drawing. Ends any stroke in progress.
    pub fn disable(&mut self) -> Vec<Action> {
        self.enabled = false;
        self.input.reset();
        self.pointer_up()
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// True when a stroke owns a captured pointer and `pointer_id` is not it.
    fn is_foreign_pointer(&self, pointer_id: Option<i32>) -> bool {
        match self.state {
            DrawState::Drawing { captured: Some(owner), .. } => pointer_id != Some(owner),
            DrawState::Drawing { captured: None, .. } | DrawState::Idle => false,
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::Drawing { .. })
    }

    #[must_use]
    pub fn state(&self) -> DrawState {
        self.state
    }

    /// This client's stroke color.
    #[must_use]
    pub fn color(&self) -> &str {
        &self.color
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}
