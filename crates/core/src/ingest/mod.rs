//! Spreadsheet ingestion: decoded rows in, per-row store mutations out.
//!
//! - [`ImportKind`] names the upload types and the tables they feed.
//! - [`RowProcessor`] maps one row to mutations (pure) and applies them.
//! - [`ImportSession`] drives a whole batch sequentially, isolating row
//!   failures and publishing progress to the [`ProgressRegistry`].
//!
//! [`ProgressRegistry`]: crate::progress::ProgressRegistry

mod kind;
mod processor;
mod row;
mod session;
mod snapshot;

pub use kind::{ImportKind, UnknownImportKind};
pub use processor::{Mutation, RowFailure, RowProcessor, SessionContext, ESE_SENTINEL};
pub use row::{RowRecord, IDENTIFIER_FIELDS, UNKNOWN_IDENTIFIER};
pub use session::{ImportRejected, ImportSession};
pub use snapshot::{
    ImportOutcome, ImportSnapshot, RowError, RowPosition, INVALID_FILE_MESSAGE,
    NO_UPLOAD_MESSAGE,
};
