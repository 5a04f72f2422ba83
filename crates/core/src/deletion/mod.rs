//! Previewable, credential-confirmed, all-or-nothing bulk deletion.

mod executor;
mod preview;
mod scope;

pub use executor::{DeletionError, DeletionExecutor, DeletionReceipt};
pub use preview::{
    DeletionOptions, DeletionPreview, KindOptions, KindPreview, PreviewCounter, ValueCount,
};
pub use scope::{
    DeletionKind, DeletionScope, DeletionTarget, Selection, Selector, PRIVILEGED_ACCOUNT,
};
