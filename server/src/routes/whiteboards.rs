//! Whiteboard directory routes: list, show and create.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use protocol::{ErrorCode, WhiteboardId};
use serde::Serialize;

use crate::services::directory::{DirectoryError, NewWhiteboard, Whiteboard};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// `GET /api/whiteboards`: list all whiteboards, oldest first.
pub async fn list_whiteboards(State(state): State<AppState>) -> Result<Json<Vec<Whiteboard>>, Response> {
    let boards = state
        .directory
        .list_whiteboards()
        .await
        .map_err(directory_error_response)?;
    Ok(Json(boards))
}

/// `GET /api/whiteboards/{id}`: show one whiteboard.
pub async fn get_whiteboard(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Whiteboard>, Response> {
    let id = WhiteboardId::new(id);
    state
        .directory
        .find_whiteboard(&id)
        .await
        .map_err(directory_error_response)?
        .map(Json)
        .ok_or_else(|| directory_error_response(DirectoryError::NotFound(id)))
}

/// `POST /api/whiteboards`: create a whiteboard.
pub async fn create_whiteboard(
    State(state): State<AppState>,
    Json(body): Json<NewWhiteboard>,
) -> Result<(StatusCode, Json<Whiteboard>), Response> {
    let board = state
        .directory
        .create_whiteboard(body)
        .await
        .map_err(directory_error_response)?;
    tracing::info!(whiteboard_id = %board.id, name = %board.name, "created whiteboard");
    Ok((StatusCode::CREATED, Json(board)))
}

pub(crate) fn directory_error_status(err: &DirectoryError) -> StatusCode {
    match err {
        DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
        DirectoryError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DirectoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn directory_error_response(err: DirectoryError) -> Response {
    let status = directory_error_status(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "directory request failed");
    }
    (status, Json(ErrorBody { code: err.error_code(), message: err.to_string() })).into_response()
}

#[cfg(test)]
#[path = "whiteboards_test.rs"]
mod tests;
