use std::sync::Arc;
use std::time::{Duration, Instant};

use super::kind::ImportKind;
use super::processor::{RowProcessor, SessionContext};
use super::row::RowRecord;
use super::snapshot::{ImportOutcome, ImportSnapshot};
use crate::error::CoreError;
use crate::progress::{ProgressRegistry, Registration};
use crate::store::KeyedStore;
use crate::tabular::DecodeError;

/// Why an upload never became a running session.
#[derive(Debug, thiserror::Error)]
pub enum ImportRejected {
    /// The file produced no rows. A terminal decode-failure snapshot has
    /// been registered so pollers can observe the outcome.
    #[error("{0}")]
    Decode(DecodeError),

    /// A session-wide precondition is missing. Nothing was registered.
    #[error(transparent)]
    Precondition(CoreError),
}

/// One registered batch of rows, processed strictly in order.
///
/// A row failure is recorded and the loop moves on; nothing short of the
/// end of the batch stops a session.
pub struct ImportSession {
    registry: Arc<ProgressRegistry>,
    registration: Registration,
    processor: RowProcessor,
    rows: Vec<RowRecord>,
    snapshot: ImportSnapshot,
    eviction_grace: Duration,
}

impl ImportSession {
    /// Validate the decoded batch, resolve its context, and register its
    /// initial snapshot before any row is processed.
    pub async fn prepare(
        registry: &Arc<ProgressRegistry>,
        store: &dyn KeyedStore,
        kind: ImportKind,
        decoded: Result<Vec<RowRecord>, DecodeError>,
        eviction_grace: Duration,
    ) -> Result<Self, ImportRejected> {
        let rows = match decoded {
            Ok(rows) if !rows.is_empty() => rows,
            Ok(_) => return Err(Self::reject_file(registry, kind, DecodeError::Empty, eviction_grace).await),
            Err(err) => return Err(Self::reject_file(registry, kind, err, eviction_grace).await),
        };

        let context = SessionContext::resolve(kind, store)
            .await
            .map_err(ImportRejected::Precondition)?;

        let snapshot = ImportSnapshot::pending(kind, rows.len());
        let registration = registry.set(snapshot.clone()).await;

        Ok(Self {
            registry: Arc::clone(registry),
            registration,
            processor: RowProcessor::new(kind, context),
            rows,
            snapshot,
            eviction_grace,
        })
    }

    async fn reject_file(
        registry: &Arc<ProgressRegistry>,
        kind: ImportKind,
        err: DecodeError,
        eviction_grace: Duration,
    ) -> ImportRejected {
        tracing::warn!(kind = %kind, error = %err, "Rejected undecodable upload");
        let registration = registry.set(ImportSnapshot::decode_failure(kind)).await;
        registry.schedule_eviction(registration, eviction_grace);
        ImportRejected::Decode(err)
    }

    pub fn kind(&self) -> ImportKind {
        self.registration.kind
    }

    pub fn total(&self) -> usize {
        self.snapshot.total
    }

    /// Process every row, publishing each outcome, then schedule eviction of
    /// the terminal snapshot. Returns the session's own final snapshot.
    pub async fn run(mut self, store: Arc<dyn KeyedStore>) -> ImportSnapshot {
        let kind = self.kind();
        let started = Instant::now();
        tracing::info!(kind = %kind, total = self.total(), "Import session started");

        let rows = std::mem::take(&mut self.rows);
        for row in &rows {
            let outcome = match self.processor.process(store.as_ref(), row).await {
                Ok(()) => ImportOutcome {
                    position: row.position,
                    identifier: row.identifier(),
                    succeeded: true,
                    error_message: None,
                },
                Err(failure) => {
                    let message = failure.normalized_message();
                    tracing::debug!(
                        kind = %kind,
                        row = row.position,
                        identifier = %row.identifier(),
                        error = %message,
                        "Import row failed",
                    );
                    ImportOutcome {
                        position: row.position,
                        identifier: row.identifier(),
                        succeeded: false,
                        error_message: Some(message),
                    }
                }
            };

            self.snapshot.record(&outcome);
            self.registry
                .update(&self.registration, |s| s.record(&outcome))
                .await;
        }

        tracing::info!(
            kind = %kind,
            processed = self.snapshot.processed,
            failed = self.snapshot.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Import session finished",
        );

        self.registry
            .schedule_eviction(self.registration, self.eviction_grace);
        self.snapshot
    }
}
