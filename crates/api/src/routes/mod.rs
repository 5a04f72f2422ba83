pub mod data_delete;
pub mod health;
pub mod upload;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /upload/{type}                       start an import (POST, multipart)
/// /upload/progress/{type}              import progress (GET, SSE)
///
/// /data-delete/options                 selector values per kind (GET)
/// /data-delete/preview                 dry-run counts (POST)
/// /data-delete/execute                 confirmed deletion (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/upload", upload::router())
        .nest("/data-delete", data_delete::router())
}
