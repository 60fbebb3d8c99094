//! Caller-owned review state for a planned batch.
//!
//! Operations are addressed by their position in the batch, so the state can
//! be serialized, reloaded and re-rendered without losing track of which
//! operations were already applied.

use crate::applier::{Applier, ApplyOutcome};
use crate::error::ReviewError;
use crate::model::{EditBatch, EditOperation, OperationKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub usize);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Unreviewed,
    Reviewed,
    Edited,
    /// Terminal.
    Applied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub id: OperationId,
    pub operation: EditOperation,
    pub status: ReviewStatus,
}

/// Field changes a reviewer makes to one operation. `None` keeps the field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationPatch {
    pub search: Option<String>,
    pub replace: Option<String>,
    pub operation_kind: Option<OperationKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewSummary {
    pub unreviewed: usize,
    pub reviewed: usize,
    pub edited: usize,
    pub applied: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "StoredReviewState")]
pub struct BatchReviewState {
    entries: Vec<ReviewEntry>,
}

#[derive(Deserialize)]
struct StoredReviewState {
    entries: Vec<ReviewEntry>,
}

impl TryFrom<StoredReviewState> for BatchReviewState {
    type Error = ReviewError;

    /// Lookups index by position, so every entry must carry its own index.
    fn try_from(stored: StoredReviewState) -> Result<Self, Self::Error> {
        if let Some((position, entry)) = stored
            .entries
            .iter()
            .enumerate()
            .find(|(position, entry)| entry.id != OperationId(*position))
        {
            return Err(ReviewError::MisplacedEntry {
                position,
                found: entry.id,
            });
        }
        Ok(Self {
            entries: stored.entries,
        })
    }
}

impl BatchReviewState {
    pub fn new(batch: EditBatch) -> Self {
        let entries = batch
            .into_iter()
            .enumerate()
            .map(|(idx, operation)| ReviewEntry {
                id: OperationId(idx),
                operation,
                status: ReviewStatus::Unreviewed,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ReviewEntry] {
        &self.entries
    }

    pub fn get(&self, id: OperationId) -> Option<&ReviewEntry> {
        self.entries.get(id.0)
    }

    pub fn mark_reviewed(&mut self, id: OperationId) -> Result<(), ReviewError> {
        let entry = self.pending_entry_mut(id)?;
        if entry.status == ReviewStatus::Unreviewed {
            entry.status = ReviewStatus::Reviewed;
        }
        Ok(())
    }

    pub fn edit(
        &mut self,
        id: OperationId,
        patch: OperationPatch,
    ) -> Result<&EditOperation, ReviewError> {
        let entry = self.pending_entry_mut(id)?;
        if let Some(search) = patch.search {
            entry.operation.search = search;
        }
        if let Some(replace) = patch.replace {
            entry.operation.replace = replace;
        }
        if let Some(kind) = patch.operation_kind {
            entry.operation.operation_kind = kind;
        }
        entry.status = ReviewStatus::Edited;
        Ok(&entry.operation)
    }

    /// Applies one operation. On failure the status is left as it was so the
    /// reviewer can fix the operation and try again.
    pub fn apply(
        &mut self,
        id: OperationId,
        applier: &Applier,
    ) -> Result<ApplyOutcome, ReviewError> {
        let entry = self.pending_entry_mut(id)?;
        let outcome = applier
            .apply_one(&entry.operation)
            .map_err(|source| ReviewError::Apply { id, source })?;
        entry.status = ReviewStatus::Applied;
        Ok(outcome)
    }

    /// Applies every pending operation in order, stopping at the first
    /// failure.
    pub fn apply_pending(
        &mut self,
        applier: &Applier,
    ) -> Result<Vec<(OperationId, ApplyOutcome)>, ReviewError> {
        let mut applied = Vec::new();
        for id in self.pending() {
            let outcome = self.apply(id, applier)?;
            applied.push((id, outcome));
        }
        Ok(applied)
    }

    pub fn pending(&self) -> Vec<OperationId> {
        self.entries
            .iter()
            .filter(|entry| entry.status != ReviewStatus::Applied)
            .map(|entry| entry.id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| entry.status == ReviewStatus::Applied)
    }

    pub fn summary(&self) -> ReviewSummary {
        let mut summary = ReviewSummary::default();
        for entry in &self.entries {
            match entry.status {
                ReviewStatus::Unreviewed => summary.unreviewed += 1,
                ReviewStatus::Reviewed => summary.reviewed += 1,
                ReviewStatus::Edited => summary.edited += 1,
                ReviewStatus::Applied => summary.applied += 1,
            }
        }
        summary
    }

    /// The batch as currently edited by the reviewer.
    pub fn to_batch(&self) -> EditBatch {
        EditBatch::new(
            self.entries
                .iter()
                .map(|entry| entry.operation.clone())
                .collect(),
        )
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn pending_entry_mut(&mut self, id: OperationId) -> Result<&mut ReviewEntry, ReviewError> {
        let entry = self
            .entries
            .get_mut(id.0)
            .ok_or(ReviewError::UnknownOperation(id))?;
        if entry.status == ReviewStatus::Applied {
            return Err(ReviewError::AlreadyApplied(id));
        }
        Ok(entry)
    }
}
