use crate::applier::ApplyReport;
use crate::review::OperationId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single filesystem operation.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// An `Edit` targeted a file that does not exist.
    #[error("edit target {} does not exist", path.display())]
    TargetNotFound { path: PathBuf },

    #[error("failed {action} {}", path.display())]
    FileSystem {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ApplyError {
    pub(crate) fn fs(path: impl Into<PathBuf>, action: &'static str, source: io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            action,
            source,
        }
    }
}

/// Returned by a batch apply when at least one operation failed. Operations
/// that succeeded stay on disk; `report` says which.
#[derive(Debug, Error)]
#[error("{}", failure_summary(.report))]
pub struct BatchApplyError {
    pub report: ApplyReport,
}

fn failure_summary(report: &ApplyReport) -> String {
    report.failure_summary()
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("operation {0} is not part of this batch")]
    UnknownOperation(OperationId),

    #[error("operation {0} was already applied")]
    AlreadyApplied(OperationId),

    #[error("review entry at position {position} is labelled {found}")]
    MisplacedEntry { position: usize, found: OperationId },

    #[error("operation {id} failed to apply")]
    Apply {
        id: OperationId,
        #[source]
        source: ApplyError,
    },
}
