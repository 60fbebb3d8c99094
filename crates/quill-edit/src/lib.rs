//! Edit model, in-memory text editor and filesystem applier.
//!
//! Every search is a literal, case-sensitive substring match. The in-memory
//! [`TextEditor`] skips pairs that do not match; the [`Applier`] is the only
//! part of the workspace that touches the filesystem.

mod applier;
mod edit_log;
mod error;
mod model;
mod review;
mod text_editor;

pub use applier::{
    Applier, ApplyOutcome, ApplyReport, CreateMode, FailurePolicy, OperationReport,
    OperationStatus, apply, apply_one,
};
pub use edit_log::{DEFAULT_EDIT_LOG_LEN, EditLog};
pub use error::{ApplyError, BatchApplyError, ReviewError};
pub use model::{EditBatch, EditOperation, OperationKind};
pub use review::{
    BatchReviewState, OperationId, OperationPatch, ReviewEntry, ReviewStatus, ReviewSummary,
};
pub use text_editor::{Edit, EditOutcome, EditReport, TextEditor, edit_document};
