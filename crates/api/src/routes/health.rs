use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use registrar_core::schema::{CellValue, ACADEMIC};
use registrar_core::store::Filter;

use crate::state::AppState;

/// Liveness plus the ingestion state an operator checks before uploading.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Import sessions still processing rows in the background.
    pub imports_running: usize,
    /// Term stamped onto course mappings; absent means those uploads get `412`.
    pub active_term: Option<String>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = registrar_db::health_check(&state.pool).await.is_ok();

    let active_term = if db_healthy {
        let filter = Filter::all().eq("active_sem", CellValue::Integer(1));
        match state.store.lookup(&ACADEMIC, &filter, "academic_sem").await {
            Ok(Some(CellValue::Null)) | Ok(None) => None,
            Ok(Some(term)) => Some(term.to_string()),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read active term for health check");
                None
            }
        }
    } else {
        None
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        imports_running: state.imports.len(),
        active_term,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
