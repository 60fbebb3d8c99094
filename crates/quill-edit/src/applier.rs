use crate::error::{ApplyError, BatchApplyError};
use crate::model::{EditBatch, EditOperation, OperationKind};
use crate::text_editor::replace_literal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What `Create` writes.
///
/// `Touch` keeps the existing content (or empty content for a new file).
/// `WriteReplace` writes the operation's `replace` text instead and must be
/// requested explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateMode {
    #[default]
    Touch,
    WriteReplace,
}

/// What a batch does after an operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure; remaining operations are not attempted.
    #[default]
    Abort,
    /// Attempt every operation and report failures at the end.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Touched,
    Edited { occurrences: usize },
    Unchanged,
    Deleted,
    AlreadyAbsent,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Touched => f.write_str("touched"),
            Self::Edited { occurrences } => write!(f, "edited ({occurrences} replaced)"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::Deleted => f.write_str("deleted"),
            Self::AlreadyAbsent => f.write_str("already absent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Applied(ApplyOutcome),
    Failed(String),
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub index: usize,
    pub target_path: PathBuf,
    pub operation_kind: OperationKind,
    pub status: OperationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyReport {
    pub operations: Vec<OperationReport>,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op.status, OperationStatus::Applied(_)))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &OperationReport> {
        self.operations
            .iter()
            .filter(|op| matches!(op.status, OperationStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn not_attempted_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.status == OperationStatus::NotAttempted)
            .count()
    }

    pub fn failure_summary(&self) -> String {
        let failed: Vec<&OperationReport> = self.failed().collect();
        let Some(first) = failed.first() else {
            return format!("all {} edit operations applied", self.operations.len());
        };
        let reason = match &first.status {
            OperationStatus::Failed(reason) => reason.as_str(),
            _ => "",
        };
        format!(
            "{} of {} edit operations failed ({} not attempted); first failure at #{} {} {}: {}",
            failed.len(),
            self.operations.len(),
            self.not_attempted_count(),
            first.index,
            first.operation_kind,
            first.target_path.display(),
            reason
        )
    }
}

/// Applies edit operations to the real filesystem, one at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Applier {
    pub create_mode: CreateMode,
}

impl Applier {
    pub fn new(create_mode: CreateMode) -> Self {
        Self { create_mode }
    }

    pub fn apply_one(&self, op: &EditOperation) -> Result<ApplyOutcome, ApplyError> {
        let path = op.path();
        let outcome = match op.operation_kind {
            OperationKind::Delete => delete_file(path)?,
            OperationKind::Create => self.create_file(path, &op.replace)?,
            OperationKind::Edit => edit_file(path, &op.search, &op.replace)?,
        };
        info!(
            kind = %op.operation_kind,
            path = %path.display(),
            outcome = %outcome,
            "applied edit operation"
        );
        Ok(outcome)
    }

    /// Applies `batch` in order. No rollback: whatever succeeded before a
    /// failure stays on disk.
    pub fn apply(
        &self,
        batch: &EditBatch,
        policy: FailurePolicy,
    ) -> Result<ApplyReport, BatchApplyError> {
        let mut operations = Vec::with_capacity(batch.len());
        let mut halted = false;

        for (index, op) in batch.iter().enumerate() {
            let status = if halted {
                OperationStatus::NotAttempted
            } else {
                match self.apply_one(op) {
                    Ok(outcome) => OperationStatus::Applied(outcome),
                    Err(err) => {
                        let reason = describe_error(&err);
                        warn!(
                            index,
                            path = %op.target_path.display(),
                            error = %reason,
                            "edit operation failed"
                        );
                        halted = policy == FailurePolicy::Abort;
                        OperationStatus::Failed(reason)
                    }
                }
            };
            operations.push(OperationReport {
                index,
                target_path: op.target_path.clone(),
                operation_kind: op.operation_kind,
                status,
            });
        }

        let report = ApplyReport { operations };
        if report.has_failures() {
            return Err(BatchApplyError { report });
        }
        Ok(report)
    }

    fn create_file(&self, path: &Path, replace: &str) -> Result<ApplyOutcome, ApplyError> {
        let existing = read_existing(path)?;
        let existed = existing.is_some();
        let content = match self.create_mode {
            CreateMode::Touch => existing.unwrap_or_default(),
            CreateMode::WriteReplace => replace.to_string(),
        };

        if !existed {
            ensure_parent_dir(path)?;
        }
        fs::write(path, content).map_err(|err| ApplyError::fs(path, "writing", err))?;

        Ok(if existed {
            ApplyOutcome::Touched
        } else {
            ApplyOutcome::Created
        })
    }
}

/// Applies one operation with the default (touch) create mode.
pub fn apply_one(op: &EditOperation) -> Result<ApplyOutcome, ApplyError> {
    Applier::default().apply_one(op)
}

/// Applies a batch with the default applier and abort-on-failure policy.
pub fn apply(batch: &EditBatch) -> Result<ApplyReport, BatchApplyError> {
    Applier::default().apply(batch, FailurePolicy::Abort)
}

fn delete_file(path: &Path) -> Result<ApplyOutcome, ApplyError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(ApplyOutcome::Deleted),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ApplyOutcome::AlreadyAbsent),
        Err(err) => Err(ApplyError::fs(path, "removing", err)),
    }
}

fn edit_file(path: &Path, search: &str, replace: &str) -> Result<ApplyOutcome, ApplyError> {
    let content = read_existing(path)?.ok_or_else(|| ApplyError::TargetNotFound {
        path: path.to_path_buf(),
    })?;

    let Some((updated, occurrences)) = replace_literal(&content, search, replace) else {
        if !search.is_empty() {
            warn!(path = %path.display(), "search string not found in file; leaving it unchanged");
        }
        return Ok(ApplyOutcome::Unchanged);
    };

    fs::write(path, updated).map_err(|err| ApplyError::fs(path, "writing", err))?;
    Ok(ApplyOutcome::Edited { occurrences })
}

fn read_existing(path: &Path) -> Result<Option<String>, ApplyError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ApplyError::fs(path, "reading", err)),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), ApplyError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|err| ApplyError::fs(parent, "creating directory", err)),
        _ => Ok(()),
    }
}

pub(crate) fn describe_error(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}
