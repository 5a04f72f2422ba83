//! Handlers for previewing and executing bulk deletions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use registrar_core::deletion::{
    DeletionError, DeletionExecutor, DeletionOptions, DeletionPreview, DeletionReceipt,
    DeletionScope, PreviewCounter,
};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /data-delete/execute`: the privileged password alongside
/// the scope's per-kind selectors.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub password: String,
    #[serde(flatten)]
    pub scope: DeletionScope,
}

#[derive(Debug, Serialize)]
struct ExecuteSucceeded {
    success: bool,
    deleted: DeletionReceipt,
}

#[derive(Debug, Serialize)]
struct ExecuteFailed {
    success: bool,
    message: String,
}

/// GET /api/v1/data-delete/options
///
/// Distinct selector values per kind, plus each kind's full row count.
pub async fn get_options(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<DeletionOptions>>> {
    let options = PreviewCounter::options(state.store.as_ref()).await?;
    Ok(Json(DataResponse { data: options }))
}

/// POST /api/v1/data-delete/preview
pub async fn preview_deletion(
    State(state): State<AppState>,
    Json(scope): Json<DeletionScope>,
) -> AppResult<Json<DataResponse<DeletionPreview>>> {
    let preview = PreviewCounter::preview(state.store.as_ref(), &scope).await?;
    Ok(Json(DataResponse { data: preview }))
}

/// POST /api/v1/data-delete/execute
///
/// Deletes the whole scope in one transaction or nothing at all. Failures
/// answer `{ success: false, message }`: `401` for a bad password, `400` for
/// an uncoercible selector, `500` once the transaction has rolled back.
pub async fn execute_deletion(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Response {
    match DeletionExecutor::execute(state.store.as_ref(), &request.password, &request.scope).await
    {
        Ok(deleted) => Json(ExecuteSucceeded {
            success: true,
            deleted,
        })
        .into_response(),
        Err(err) => {
            let (status, message) = match &err {
                DeletionError::Unauthorized => {
                    (StatusCode::UNAUTHORIZED, "Invalid password".to_string())
                }
                DeletionError::InvalidScope(e) => (StatusCode::BAD_REQUEST, e.to_string()),
                DeletionError::Store(_) | DeletionError::Transaction(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Deletion failed".to_string())
                }
            };
            (
                status,
                Json(ExecuteFailed {
                    success: false,
                    message,
                }),
            )
                .into_response()
        }
    }
}
