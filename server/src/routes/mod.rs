//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the websocket endpoint for the broadcast channel, the
//! whiteboard directory API and the health check under a single Axum router.

pub mod whiteboards;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/whiteboards",
            get(whiteboards::list_whiteboards).post(whiteboards::create_whiteboard),
        )
        .route("/api/whiteboards/{id}", get(whiteboards::get_whiteboard))
        .route("/api/ws", get(ws::handle_ws))
        .route("/up", get(up))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn up() -> StatusCode {
    StatusCode::OK
}
