//! Route definitions for spreadsheet imports.
//!
//! Mounted at `/upload`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::upload;
use crate::state::AppState;

/// Routes mounted at `/upload`.
///
/// ```text
/// POST   /{type}             -> upload_file      (multipart, field "file")
/// GET    /progress/{type}    -> stream_progress  (server-sent events)
/// ```
///
/// The upload route lifts axum's default body cap; the handler enforces
/// `MAX_UPLOAD_BYTES` itself while reading the file.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{type}",
            post(upload::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/progress/{type}", get(upload::stream_progress))
}
