//! Drawing surface and connection lifecycle for the shared whiteboard.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It turns
//! raw DOM input into stroke segments, renders local and remote strokes on a
//! 2D canvas, and keeps a websocket subscription to the whiteboard's
//! broadcast channel alive. Everything except `dom` and `transport` is
//! plain Rust and is tested natively; those two exist only under the
//! `hydrate` feature.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Idle/Drawing state machine ([`engine::SurfaceCore`]) |
//! | [`viewport`] | Client-to-bitmap coordinate mapping |
//! | [`input`] | Input event types and event-family arbitration |
//! | [`render`] | Renderer trait and the Canvas2D implementation |
//! | [`color`] | Per-client stroke color |
//! | [`connection`] | Join handshake, inbound routing and reconnect backoff |
//! | [`setup`] | Host element discovery errors and canvas sizing |
//! | [`consts`] | Stroke style, DOM attribute names, reconnect timings |

pub mod color;
pub mod connection;
pub mod consts;
pub mod engine;
pub mod input;
pub mod render;
pub mod setup;
pub mod viewport;

#[cfg(feature = "hydrate")]
pub mod dom;
#[cfg(feature = "hydrate")]
mod transport;
