//! Handlers for spreadsheet uploads and their progress stream.

use std::convert::Infallible;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;

use registrar_core::error::CoreError;
use registrar_core::ingest::{
    ImportKind, ImportRejected, ImportSession, RowRecord, INVALID_FILE_MESSAGE,
};
use registrar_core::progress::progress_stream;
use registrar_core::tabular::{decode_file, DecodeError};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Name of the multipart field carrying the spreadsheet.
const FILE_FIELD: &str = "file";

/// Keep-alive comment period for idle progress streams.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Acknowledgement returned once a session is registered.
#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    #[serde(rename = "type")]
    pub kind: ImportKind,
    pub total: usize,
}

/// A file read from the multipart body, not yet decoded.
struct ReceivedFile {
    extension: String,
    bytes: Vec<u8>,
}

// ── Upload ───────────────────────────────────────────────────────────

/// POST /api/v1/upload/{type}
///
/// Decodes the uploaded file, registers an import session and answers
/// `202 Accepted` straight away; rows are processed by a background task.
/// Unknown types are `404`, undecodable or empty files are `400` (their
/// failure snapshot is still registered for pollers), and a missing active
/// term is `412` with nothing registered.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadAccepted>>)> {
    let kind = parse_kind(&kind)?;
    let file = read_file_field(multipart, state.config.max_upload_bytes).await?;
    let decoded = decode_upload(state.config.upload_dir.clone(), file).await?;

    let session = ImportSession::prepare(
        &state.progress,
        state.store.as_ref(),
        kind,
        decoded,
        state.config.progress_eviction,
    )
    .await
    .map_err(|rejected| match rejected {
        ImportRejected::Decode(_) => AppError::BadRequest(INVALID_FILE_MESSAGE.to_string()),
        ImportRejected::Precondition(err) => AppError::Core(err),
    })?;

    let accepted = UploadAccepted {
        kind,
        total: session.total(),
    };
    state.imports.spawn(session.run(Arc::clone(&state.store)));

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse { data: accepted }),
    ))
}

fn parse_kind(raw: &str) -> AppResult<ImportKind> {
    raw.parse().map_err(|_| {
        AppError::Core(CoreError::NotFound {
            entity: "import type",
            key: raw.to_string(),
        })
    })
}

/// Pull the `file` field out of the body, enforcing `limit` while reading.
async fn read_file_field(mut multipart: Multipart, limit: usize) -> AppResult<ReceivedFile> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the {limit} byte upload limit"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(ReceivedFile { extension, bytes });
    }

    Err(AppError::BadRequest(format!(
        "Missing required '{FILE_FIELD}' field"
    )))
}

/// Stage the upload in `upload_dir`, decode it, and remove the staged copy.
///
/// The outer error covers staging I/O only; a decode failure is handed back
/// as the inner result so the session can register it.
async fn decode_upload(
    upload_dir: PathBuf,
    file: ReceivedFile,
) -> AppResult<Result<Vec<RowRecord>, DecodeError>> {
    tokio::task::spawn_blocking(move || {
        let suffix = format!(".{}", file.extension);
        let mut staged = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&upload_dir)?;
        staged.write_all(&file.bytes)?;
        staged.flush()?;

        let decoded = decode_file(staged.path());
        // Dropping the handle unlinks the staged file.
        drop(staged);
        Ok::<_, std::io::Error>(decoded)
    })
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?
    .map_err(|e| AppError::InternalError(format!("Failed to stage upload: {e}")))
}

// ── Progress ─────────────────────────────────────────────────────────

/// GET /api/v1/upload/progress/{type}
///
/// Server-sent `progress` events carrying the current snapshot, sampled
/// until the session turns terminal. An idle type yields one terminal
/// "no upload in progress" event.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let kind = parse_kind(&kind)?;

    let stream = progress_stream(
        Arc::clone(&state.progress),
        kind,
        state.config.progress_interval,
    )
    .map(|snapshot| {
        let data = serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event("progress").data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}
