use anyhow::{Context, Result};
use quill_edit::{Applier, ApplyReport, EditBatch, FailurePolicy, OperationStatus};
use quill_llm::GenerationService;
use std::fs;
use std::path::Path;

mod planner;
mod retry;
mod session;

pub use planner::{EDIT_BATCH_SCHEMA_NAME, PlanError, PlanRequest, Planner, build_plan_directive};
pub use retry::{
    AttemptFailure, DEFAULT_MAX_ATTEMPTS, RetryExhausted, RetryPolicy, retry_with_policy,
};
pub use session::{DocumentSession, RewriteOptions, build_rewrite_directive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Silent,
    Minimal,
    Verbose,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub failure_policy: FailurePolicy,
    pub dry_run: bool,
    pub progress_mode: ProgressMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub batch: EditBatch,
    /// `None` for a dry run.
    pub report: Option<ApplyReport>,
}

pub fn load_batch(path: &Path) -> Result<EditBatch> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading edit batch {}", path.display()))?;
    EditBatch::from_json(&raw)
        .with_context(|| format!("failed to parse edit batch {}", path.display()))
}

pub fn save_batch(path: &Path, batch: &EditBatch) -> Result<()> {
    let json = batch
        .to_json_pretty()
        .context("failed to serialize edit batch")?;
    fs::write(path, format!("{json}\n"))
        .with_context(|| format!("failed writing edit batch {}", path.display()))
}

/// Applies `batch` and prints one progress line per operation.
///
/// A failed batch comes back as a [`quill_edit::BatchApplyError`] inside the
/// `anyhow` error, so callers can still reach the full report.
pub fn apply_batch(
    applier: &Applier,
    batch: &EditBatch,
    policy: FailurePolicy,
    progress_mode: ProgressMode,
) -> Result<ApplyReport> {
    if matches!(progress_mode, ProgressMode::Verbose) {
        eprintln!(
            "[quill] applying {} edit operations (on_error={policy:?}, create_mode={:?})",
            batch.len(),
            applier.create_mode
        );
    }

    let result = applier.apply(batch, policy);
    let report = match &result {
        Ok(report) => report,
        Err(err) => &err.report,
    };
    report_progress(report, progress_mode);

    Ok(result?)
}

fn report_progress(report: &ApplyReport, progress_mode: ProgressMode) {
    match progress_mode {
        ProgressMode::Silent => {}
        ProgressMode::Minimal => {
            eprintln!(
                "[quill] applied {}/{} edit operations",
                report.applied_count(),
                report.operations.len()
            );
        }
        ProgressMode::Verbose => {
            for op in &report.operations {
                let status = match &op.status {
                    OperationStatus::Applied(outcome) => outcome.to_string(),
                    OperationStatus::Failed(reason) => format!("failed: {reason}"),
                    OperationStatus::NotAttempted => "not attempted".to_string(),
                };
                eprintln!(
                    "[quill] #{} {} {} -> {status}",
                    op.index,
                    op.operation_kind,
                    op.target_path.display()
                );
            }
        }
    }
}

/// Plans edits for `request`, then applies them unless this is a dry run.
pub fn plan_and_apply<S>(
    planner: &Planner<S>,
    applier: &Applier,
    request: &PlanRequest,
    options: &PipelineOptions,
) -> Result<PipelineOutcome>
where
    S: GenerationService,
{
    match options.progress_mode {
        ProgressMode::Silent => {}
        ProgressMode::Minimal => eprintln!("[quill] planning edits"),
        ProgressMode::Verbose => eprintln!(
            "[quill] planning edits (selection={:?}, model={:?}, reasoning={}, max_attempts={})",
            request.selection,
            request.model,
            request.reasoning.as_str(),
            planner.retry.max_attempts()
        ),
    }

    let batch = planner.plan(request)?;
    if !matches!(options.progress_mode, ProgressMode::Silent) {
        eprintln!("[quill] planned {} edit operations", batch.len());
    }

    if options.dry_run {
        return Ok(PipelineOutcome {
            batch,
            report: None,
        });
    }

    let report = apply_batch(
        applier,
        &batch,
        options.failure_policy,
        options.progress_mode,
    )?;
    Ok(PipelineOutcome {
        batch,
        report: Some(report),
    })
}
