//! Input model: event sources, gesture phases, and source arbitration.
//!
//! Browsers report one physical gesture through several event families: a
//! finger on a touch screen can produce touch events, pointer events and
//! emulated mouse events. `InputArbiter` decides which family drives the
//! surface so each gesture is drawn exactly once.
//!
//! Pointer events are used exclusively when the browser supports them.
//! Otherwise mouse and touch are both listened to, and the first family to
//! start a gesture owns it until that gesture ends.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::viewport::Point;

/// DOM event family an input event arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Pointer,
    Mouse,
    Touch,
}

/// Gesture phase carried by an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `pointerdown` / `mousedown` / `touchstart`.
    Down,
    /// `pointermove` / `mousemove` / `touchmove`.
    Move,
    /// `pointerup` / `mouseup` / `touchend`.
    Up,
    /// `pointerout` / `mouseout`: the cursor left the element.
    Out,
    /// `pointercancel` / `touchcancel`.
    Cancel,
}

impl Phase {
    /// Whether this phase ends the current gesture.
    #[must_use]
    pub fn ends_gesture(self) -> bool {
        matches!(self, Self::Up | Self::Out | Self::Cancel)
    }
}

/// A normalized input event in client (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub source: InputSource,
    pub phase: Phase,
    pub client: Point,
    /// Present for pointer events; used for pointer capture.
    pub pointer_id: Option<i32>,
}

impl InputEvent {
    #[must_use]
    pub fn new(source: InputSource, phase: Phase, client: Point) -> Self {
        Self { source, phase, client, pointer_id: None }
    }

    #[must_use]
    pub fn pointer(phase: Phase, client: Point, pointer_id: i32) -> Self {
        Self { source: InputSource::Pointer, phase, client, pointer_id: Some(pointer_id) }
    }
}

/// Event families the host environment supports.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSupport {
    pub pointer: bool,
    pub mouse: bool,
    pub touch: bool,
}

impl InputSupport {
    /// Every family available, as in a modern desktop browser.
    #[must_use]
    pub fn all() -> Self {
        Self { pointer: true, mouse: true, touch: true }
    }

    /// Families the surface should listen to, in preference order.
    #[must_use]
    pub fn enabled_sources(self) -> Vec<InputSource> {
        if self.pointer {
            return vec![InputSource::Pointer];
        }
        let mut sources = Vec::with_capacity(2);
        if self.mouse {
            sources.push(InputSource::Mouse);
        }
        if self.touch {
            sources.push(InputSource::Touch);
        }
        sources
    }
}

/// Chooses which event family drives each gesture.
#[derive(Debug, Clone)]
pub struct InputArbiter {
    enabled: Vec<InputSource>,
    active: Option<InputSource>,
}

impl InputArbiter {
    #[must_use]
    pub fn new(support: InputSupport) -> Self {
        Self { enabled: support.enabled_sources(), active: None }
    }

    /// Families this arbiter accepts at all.
    #[must_use]
    pub fn enabled_sources(&self) -> &[InputSource] {
        &self.enabled
    }

    /// Family owning the gesture in progress, if any.
    #[must_use]
    pub fn active_source(&self) -> Option<InputSource> {
        self.active
    }

    /// Decide whether an event should reach the drawing state machine.
    ///
    /// A `Down` from an enabled family starts a gesture and locks it to that
    /// family. Events from other families are ignored until the gesture ends.
    pub fn admit(&mut self, event: &InputEvent) -> bool {
        if !self.enabled.contains(&event.source) {
            return false;
        }
        match self.active {
            None => {
                if event.phase == Phase::Down {
                    self.active = Some(event.source);
                    true
                } else {
                    false
                }
            }
            Some(owner) if owner != event.source => false,
            Some(_) => {
                if event.phase.ends_gesture() {
                    self.active = None;
                }
                true
            }
        }
    }

    /// Forget any gesture in progress.
    pub fn reset(&mut self) {
        self.active = None;
    }
}
