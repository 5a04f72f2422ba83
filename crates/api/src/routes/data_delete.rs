//! Route definitions for bulk deletion.
//!
//! Mounted at `/data-delete`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::data_delete;
use crate::state::AppState;

/// Routes mounted at `/data-delete`.
///
/// ```text
/// GET    /options     -> get_options
/// POST   /preview     -> preview_deletion
/// POST   /execute     -> execute_deletion
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/options", get(data_delete::get_options))
        .route("/preview", post(data_delete::preview_deletion))
        .route("/execute", post(data_delete::execute_deletion))
}
