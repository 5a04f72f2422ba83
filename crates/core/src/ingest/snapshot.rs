use serde::{Serialize, Serializer};

use super::kind::ImportKind;
use crate::types::Timestamp;

/// Error text for a file that could not be decoded into any rows.
pub const INVALID_FILE_MESSAGE: &str = "invalid or empty file";

/// Message carried by the synthetic snapshot for an idle import type.
pub const NO_UPLOAD_MESSAGE: &str = "no upload in progress";

/// Where a reported error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPosition {
    /// 1-indexed sheet row (header is row 1).
    Line(usize),
    /// The failure is not tied to a row (serialized as `"-"`).
    NotApplicable,
}

impl Serialize for RowPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Line(n) => serializer.serialize_u64(*n as u64),
            Self::NotApplicable => serializer.serialize_str("-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: RowPosition,
    pub identifier: String,
    pub message: String,
}

/// Result of processing one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub position: usize,
    pub identifier: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

/// Progress of one import session as seen by pollers.
///
/// `processed + failed <= total` always holds; the snapshot is terminal
/// exactly when every row has been accounted for (or for the decode-failure
/// and idle shapes, which are terminal from birth).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSnapshot {
    #[serde(rename = "type")]
    pub kind: ImportKind,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub percent: u8,
    pub errors: Vec<RowError>,
    pub terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: Timestamp,
}

impl ImportSnapshot {
    /// Fresh snapshot for a decoded batch of `total` rows.
    pub fn pending(kind: ImportKind, total: usize) -> Self {
        let mut snapshot = Self {
            kind,
            total,
            processed: 0,
            failed: 0,
            percent: 0,
            errors: Vec::new(),
            terminal: false,
            message: None,
            started_at: chrono::Utc::now(),
        };
        snapshot.refresh();
        snapshot
    }

    /// Terminal snapshot for an undecodable or empty upload.
    pub fn decode_failure(kind: ImportKind) -> Self {
        Self {
            kind,
            total: 0,
            processed: 0,
            failed: 1,
            percent: 100,
            errors: vec![RowError {
                row: RowPosition::NotApplicable,
                identifier: "-".to_string(),
                message: INVALID_FILE_MESSAGE.to_string(),
            }],
            terminal: true,
            message: Some(INVALID_FILE_MESSAGE.to_string()),
            started_at: chrono::Utc::now(),
        }
    }

    /// Terminal placeholder for a type with no registered session.
    pub fn no_upload(kind: ImportKind) -> Self {
        Self {
            kind,
            total: 0,
            processed: 0,
            failed: 0,
            percent: 100,
            errors: Vec::new(),
            terminal: true,
            message: Some(NO_UPLOAD_MESSAGE.to_string()),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn record(&mut self, outcome: &ImportOutcome) {
        if self.terminal {
            return;
        }
        if outcome.succeeded {
            self.processed += 1;
        } else {
            self.failed += 1;
            self.errors.push(RowError {
                row: RowPosition::Line(outcome.position),
                identifier: outcome.identifier.clone(),
                message: outcome
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        let done = self.processed + self.failed;
        self.terminal = done >= self.total;
        self.percent = if self.total == 0 {
            100
        } else {
            // Floored, so 100 is only reported once every row is counted.
            (done * 100 / self.total).min(100) as u8
        };
    }
}
