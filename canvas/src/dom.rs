//! Browser mounting: binds a canvas element to a [`SurfaceCore`] and a
//! [`ConnectionCore`], installs input listeners and starts the transport.
//!
//! SYSTEM CONTEXT
//! ==============
//! The host page renders `<canvas id="drawing-canvas" data-whiteboard-id="…">`
//! and calls `mount()`. Everything after that runs on the single browser
//! thread: listeners and the transport task share state through `Rc`.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc;
use protocol::DrawingData;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Event, HtmlCanvasElement, MouseEvent, PointerEvent, TouchEvent, Window};

use crate::color::random_stroke_color;
use crate::connection::{ConnectionCore, ConnectionStatus, websocket_url};
use crate::consts::{CONNECTION_STATUS_ATTR, DEFAULT_CANVAS_ID, WHITEBOARD_ID_ATTR};
use crate::engine::{Action, SurfaceCore};
use crate::input::{InputEvent, InputSource, InputSupport, Phase};
use crate::render::Canvas2dRenderer;
use crate::setup::{SetupError, bitmap_size, whiteboard_id_from_attribute};
use crate::viewport::{Point, Viewport};

// =============================================================================
// SHARED STATE
// =============================================================================

/// State reachable from DOM listeners and the transport task.
pub(crate) struct Shared {
    pub(crate) canvas: HtmlCanvasElement,
    pub(crate) surface: RefCell<SurfaceCore<Canvas2dRenderer>>,
    pub(crate) connection: RefCell<ConnectionCore>,
    outbox: mpsc::UnboundedSender<String>,
}

impl Shared {
    fn handle_input(&self, input: &InputEvent) {
        if input.phase == Phase::Down {
            let viewport = viewport_of(&self.canvas);
            self.surface.borrow_mut().set_viewport(viewport);
        }
        let actions = self.surface.borrow_mut().handle_input(input);
        self.dispatch(actions);
    }

    pub(crate) fn dispatch(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(data) => self.send(data),
                Action::CapturePointer(id) => {
                    if let Err(e) = self.canvas.set_pointer_capture(id) {
                        log::debug!("pointer capture failed for {id}: {e:?}");
                    }
                }
                Action::ReleasePointer(id) => {
                    if let Err(e) = self.canvas.release_pointer_capture(id) {
                        log::debug!("pointer release failed for {id}: {e:?}");
                    }
                }
            }
        }
    }

    fn send(&self, data: DrawingData) {
        let Some(text) = self.connection.borrow().outbound(data) else {
            log::debug!("not joined; dropping local drawing payload");
            return;
        };
        if self.outbox.unbounded_send(text).is_err() {
            log::warn!("outbound queue closed; dropping local drawing payload");
        }
    }

    /// Mirror the connection status onto the host element. A rejection also
    /// disables local drawing.
    pub(crate) fn publish_status(&self) {
        let status = self.connection.borrow().status();
        if let Err(e) = self.canvas.set_attribute(CONNECTION_STATUS_ATTR, status.as_str()) {
            log::debug!("failed to set {CONNECTION_STATUS_ATTR}: {e:?}");
        }
        if status == ConnectionStatus::Rejected && self.surface.borrow().is_enabled() {
            let actions = self.surface.borrow_mut().disable();
            self.dispatch(actions);
        }
    }
}

// =============================================================================
// JS SURFACE
// =============================================================================

/// Handle returned to the host page.
#[wasm_bindgen]
pub struct WhiteboardSurface {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl WhiteboardSurface {
    /// Erase the canvas and tell every peer to do the same.
    pub fn clear(&self) {
        let actions = self.shared.surface.borrow_mut().clear_local();
        self.shared.dispatch(actions);
    }

    #[wasm_bindgen(getter)]
    pub fn status(&self) -> String {
        self.shared.connection.borrow().status().as_str().to_owned()
    }

    #[wasm_bindgen(getter)]
    pub fn color(&self) -> String {
        self.shared.surface.borrow().color().to_owned()
    }

    /// Whiteboard confirmed by the server, once joined.
    #[wasm_bindgen(getter, js_name = whiteboardId)]
    pub fn whiteboard_id(&self) -> Option<String> {
        self.shared.connection.borrow().joined().map(ToString::to_string)
    }
}

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&format!("console logger unavailable: {e}").into());
    }
}

/// Mount the whiteboard on `canvas_id` (`drawing-canvas` when omitted) and
/// connect to the broadcast channel.
///
/// # Errors
///
/// The [`SetupError`] message when the page lacks the canvas, its 2D context
/// or its whiteboard id. Nothing is mounted in that case.
#[wasm_bindgen]
pub fn mount(canvas_id: Option<String>) -> Result<WhiteboardSurface, JsValue> {
    let canvas_id = canvas_id.unwrap_or_else(|| DEFAULT_CANVAS_ID.to_owned());
    mount_on(&canvas_id).map_err(|e| {
        log::error!("whiteboard setup failed: {e}");
        JsValue::from_str(&e.to_string())
    })
}

fn mount_on(canvas_id: &str) -> Result<WhiteboardSurface, SetupError> {
    let window = web_sys::window().ok_or(SetupError::NoDocument)?;
    let document = window.document().ok_or(SetupError::NoDocument)?;
    let canvas = document
        .get_element_by_id(canvas_id)
        .ok_or_else(|| SetupError::MissingCanvas(canvas_id.to_owned()))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| SetupError::NotCanvas(canvas_id.to_owned()))?;
    let whiteboard_id = whiteboard_id_from_attribute(canvas.get_attribute(WHITEBOARD_ID_ATTR))?;
    let ctx = match canvas.get_context("2d") {
        Ok(Some(obj)) => obj.dyn_into::<CanvasRenderingContext2d>().map_err(|_| SetupError::NoContext)?,
        Ok(None) | Err(_) => return Err(SetupError::NoContext),
    };

    // Resizing resets context state, so size before styling.
    size_canvas(&window, &canvas);
    let renderer = Canvas2dRenderer::new(canvas.clone(), ctx);
    let support = detect_input_support(&window);
    let color = random_stroke_color();
    log::info!("mounting whiteboard {whiteboard_id} with stroke color {color}");

    let surface = SurfaceCore::new(renderer, viewport_of(&canvas), support, color);
    let (outbox, rx) = mpsc::unbounded::<String>();
    let shared = Rc::new(Shared {
        canvas,
        surface: RefCell::new(surface),
        connection: RefCell::new(ConnectionCore::new(Some(whiteboard_id))),
        outbox,
    });

    for source in support.enabled_sources() {
        install_listeners(&shared, source)?;
    }

    let href = window.location().href().unwrap_or_default();
    let host = window.location().host().unwrap_or_else(|_| "localhost:3000".to_owned());
    crate::transport::spawn(Rc::clone(&shared), websocket_url(&href, &host), rx);
    shared.publish_status();

    Ok(WhiteboardSurface { shared })
}

// =============================================================================
// GEOMETRY
// =============================================================================

fn size_canvas(window: &Window, canvas: &HtmlCanvasElement) {
    let container_width = canvas
        .parent_element()
        .map_or_else(|| canvas.client_width(), |parent| parent.client_width());
    let inner_height = window.inner_height().map_or(0.0, |v| v.as_f64().unwrap_or(0.0));
    let (width, height) = bitmap_size(container_width, inner_height);
    canvas.set_width(width);
    canvas.set_height(height);
}

fn viewport_of(canvas: &HtmlCanvasElement) -> Viewport {
    let rect = canvas.get_bounding_client_rect();
    Viewport {
        left: rect.left(),
        top: rect.top(),
        display_width: rect.width(),
        display_height: rect.height(),
        bitmap_width: f64::from(canvas.width()),
        bitmap_height: f64::from(canvas.height()),
    }
}

// =============================================================================
// INPUT
// =============================================================================

fn detect_input_support(window: &Window) -> InputSupport {
    let target: &js_sys::Object = window.as_ref();
    let has = |name: &str| js_sys::Reflect::has(target, &JsValue::from_str(name)).unwrap_or(false);
    InputSupport { pointer: has("PointerEvent"), mouse: true, touch: has("ontouchstart") }
}

fn install_listeners(shared: &Rc<Shared>, source: InputSource) -> Result<(), SetupError> {
    match source {
        InputSource::Pointer => {
            for (name, phase) in [
                ("pointerdown", Phase::Down),
                ("pointermove", Phase::Move),
                ("pointerup", Phase::Up),
                ("pointerout", Phase::Out),
                ("pointercancel", Phase::Cancel),
            ] {
                listen::<PointerEvent>(shared, name, phase, |ev, phase| {
                    InputEvent::pointer(phase, client_point(ev), ev.pointer_id())
                })?;
            }
        }
        InputSource::Mouse => {
            for (name, phase) in
                [("mousedown", Phase::Down), ("mousemove", Phase::Move), ("mouseup", Phase::Up), ("mouseout", Phase::Out)]
            {
                listen::<MouseEvent>(shared, name, phase, |ev, phase| {
                    InputEvent::new(InputSource::Mouse, phase, client_point(ev))
                })?;
            }
        }
        InputSource::Touch => {
            for (name, phase) in [
                ("touchstart", Phase::Down),
                ("touchmove", Phase::Move),
                ("touchend", Phase::Up),
                ("touchcancel", Phase::Cancel),
            ] {
                listen::<TouchEvent>(shared, name, phase, touch_input)?;
            }
        }
    }
    Ok(())
}

fn listen<E>(
    shared: &Rc<Shared>,
    event_name: &str,
    phase: Phase,
    to_input: fn(&E, Phase) -> InputEvent,
) -> Result<(), SetupError>
where
    E: JsCast + 'static,
{
    let handler_shared = Rc::clone(shared);
    let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        event.prevent_default();
        if let Some(typed) = event.dyn_ref::<E>() {
            handler_shared.handle_input(&to_input(typed, phase));
        }
    });
    shared
        .canvas
        .add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref())
        .map_err(|_| SetupError::Listener(event_name.to_owned()))?;
    closure.forget();
    Ok(())
}

fn client_point(ev: &MouseEvent) -> Point {
    Point::new(f64::from(ev.client_x()), f64::from(ev.client_y()))
}

/// First active touch; `touchend` has none left, so fall back to the lifted one.
fn touch_input(ev: &TouchEvent, phase: Phase) -> InputEvent {
    let touch = ev.touches().get(0).or_else(|| ev.changed_touches().get(0));
    let client = touch.map_or(Point::new(0.0, 0.0), |t| Point::new(f64::from(t.client_x()), f64::from(t.client_y())));
    InputEvent::new(InputSource::Touch, phase, client)
}
