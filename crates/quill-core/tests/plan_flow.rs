use anyhow::{Result, anyhow};
use quill_core::{
    DocumentSession, PipelineOptions, PlanError, PlanRequest, Planner, ProgressMode,
    RetryPolicy, RewriteOptions, load_batch, plan_and_apply, save_batch,
};
use quill_edit::{
    Applier, ApplyOutcome, BatchApplyError, EditBatch, EditOperation, FailurePolicy,
    OperationKind, OperationStatus,
};
use quill_llm::{
    GenerateRequest, GenerateResponse, GenerationService, Provider, ProviderDescriptor,
    ProviderSelection,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Replays scripted replies in order; the last one repeats once the script
/// runs out.
struct ScriptedService {
    replies: RefCell<VecDeque<Result<String, String>>>,
    last: Result<String, String>,
    calls: Cell<usize>,
    seen: RefCell<Vec<GenerateRequest>>,
}

impl ScriptedService {
    fn new(replies: Vec<Result<&str, &str>>) -> Self {
        let replies: VecDeque<Result<String, String>> = replies
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        let last = replies
            .back()
            .cloned()
            .unwrap_or_else(|| Err("no reply scripted".to_string()));
        Self {
            replies: RefCell::new(replies),
            last,
            calls: Cell::new(0),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn always(reply: Result<&str, &str>) -> Self {
        Self::new(vec![reply])
    }
}

impl GenerationService for ScriptedService {
    fn candidate_chain(&self, _selection: ProviderSelection) -> Vec<ProviderDescriptor> {
        vec![ProviderDescriptor {
            provider: Provider::Ollama,
            model: "scripted".to_string(),
        }]
    }

    fn generate(
        &self,
        _selection: ProviderSelection,
        req: &GenerateRequest,
        _model_override: Option<&str>,
    ) -> Result<GenerateResponse> {
        self.calls.set(self.calls.get() + 1);
        self.seen.borrow_mut().push(req.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.last.clone());
        reply
            .map(|text| GenerateResponse {
                text,
                provider: Provider::Ollama,
                model: "scripted".to_string(),
            })
            .map_err(|err| anyhow!(err))
    }
}

fn silent(policy: FailurePolicy) -> PipelineOptions {
    PipelineOptions {
        failure_policy: policy,
        dry_run: false,
        progress_mode: ProgressMode::Silent,
    }
}

fn batch_json(ops: &[(&Path, &str, &str, &str)]) -> String {
    let edits: Vec<serde_json::Value> = ops
        .iter()
        .map(|(path, search, replace, kind)| {
            serde_json::json!({
                "target_path": path,
                "search": search,
                "replace": replace,
                "operation_kind": kind,
            })
        })
        .collect();
    serde_json::json!({ "edits": edits }).to_string()
}

#[test]
fn malformed_output_exhausts_after_five_calls() {
    let planner = Planner::new(
        ScriptedService::always(Ok("I would rather not answer in JSON.")),
        RetryPolicy::default(),
    );

    let err = planner
        .plan(&PlanRequest::new("rename foo to bar"))
        .expect_err("planning must give up");

    assert_eq!(planner.service.calls.get(), 5);
    match err {
        PlanError::Exhausted { attempts, failures } => {
            assert_eq!(attempts, 5);
            assert_eq!(failures.len(), 5);
            assert!(failures[0].error.contains("no JSON object"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn transport_and_shape_errors_each_spend_one_attempt() {
    let good = r#"{"edits":[{"target_path":"/tmp/x","search":"","replace":"","operation_kind":"Delete"}]}"#;
    let planner = Planner::new(
        ScriptedService::new(vec![
            Err("connection refused"),
            Ok(r#"{"edits":[{"target_path":"/tmp/x","operation_kind":"Rename"}]}"#),
            Ok(good),
        ]),
        RetryPolicy::new(3),
    );

    let batch = planner
        .plan(&PlanRequest::new("remove /tmp/x"))
        .expect("third attempt succeeds");

    assert_eq!(planner.service.calls.get(), 3);
    assert_eq!(batch.edits, vec![EditOperation::delete("/tmp/x")]);
}

#[test]
fn planner_sends_directive_schema_and_reasoning() {
    let planner = Planner::new(
        ScriptedService::always(Ok(r#"{"edits":[]}"#)),
        RetryPolicy::default(),
    );
    let mut request = PlanRequest::new("make it so");
    request.reasoning = quill_llm::ReasoningEffort::High;

    let batch = planner.plan(&request).expect("empty batch is valid");
    assert!(batch.is_empty());

    let seen = planner.service.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].message.ends_with("Plan:\nmake it so"));
    assert_eq!(seen[0].reasoning, quill_llm::ReasoningEffort::High);
    let schema = seen[0].response_schema.as_ref().expect("schema attached");
    assert_eq!(schema.name, "edit_batch");
}

#[test]
fn rename_scenario_end_to_end() {
    let dir = tempdir().expect("tempdir");
    let target = dir.path().join("main.py");
    fs::write(&target, "foo = 1\nprint(foo)").expect("seed file");

    let reply = batch_json(&[(target.as_path(), "foo", "bar", "Edit")]);
    let planner = Planner::new(
        ScriptedService::always(Ok(&reply)),
        RetryPolicy::default(),
    );

    let outcome = plan_and_apply(
        &planner,
        &Applier::default(),
        &PlanRequest::new("rename variable foo to bar in main.py"),
        &silent(FailurePolicy::Abort),
    )
    .expect("pipeline succeeds");

    assert_eq!(
        fs::read_to_string(&target).expect("read back"),
        "bar = 1\nprint(bar)"
    );
    let report = outcome.report.expect("not a dry run");
    assert_eq!(
        report.operations[0].status,
        OperationStatus::Applied(ApplyOutcome::Edited { occurrences: 2 })
    );
}

#[test]
fn dry_run_leaves_files_alone() {
    let dir = tempdir().expect("tempdir");
    let target = dir.path().join("gone.txt");
    fs::write(&target, "keep me").expect("seed file");

    let reply = batch_json(&[(target.as_path(), "", "", "Delete")]);
    let planner = Planner::new(
        ScriptedService::always(Ok(&reply)),
        RetryPolicy::default(),
    );
    let mut options = silent(FailurePolicy::Abort);
    options.dry_run = true;

    let outcome = plan_and_apply(
        &planner,
        &Applier::default(),
        &PlanRequest::new("delete gone.txt"),
        &options,
    )
    .expect("dry run succeeds");

    assert!(outcome.report.is_none());
    assert_eq!(outcome.batch.edits[0].operation_kind, OperationKind::Delete);
    assert!(target.exists());
}

#[test]
fn failed_apply_keeps_the_report_reachable() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.rs");
    let created = dir.path().join("new.rs");

    let reply = batch_json(&[
        (missing.as_path(), "a", "b", "Edit"),
        (created.as_path(), "", "", "Create"),
    ]);
    let planner = Planner::new(
        ScriptedService::always(Ok(&reply)),
        RetryPolicy::default(),
    );

    let err = plan_and_apply(
        &planner,
        &Applier::default(),
        &PlanRequest::new("edit then create"),
        &silent(FailurePolicy::Continue),
    )
    .expect_err("first operation fails");

    let batch_err = err
        .downcast_ref::<BatchApplyError>()
        .expect("batch error is preserved");
    assert_eq!(batch_err.report.applied_count(), 1);
    assert!(created.exists());
}

#[test]
fn batch_file_round_trip() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("batch.json");
    let batch = EditBatch::new(vec![
        EditOperation::create("/srv/app/new.txt"),
        EditOperation::edit("/srv/app/lib.rs", "old", "new"),
    ]);

    save_batch(&path, &batch).expect("save");
    assert_eq!(load_batch(&path).expect("load"), batch);
}

#[test]
fn load_batch_names_the_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    fs::write(&path, "{\"edits\": [").expect("write");

    let err = load_batch(&path).expect_err("truncated json");
    assert!(err.to_string().contains("broken.json"));
}

#[test]
fn rewrite_session_applies_and_navigates() {
    let service = ScriptedService::new(vec![Ok("Good evening"), Ok("See you")]);
    let mut session = DocumentSession::new(
        service,
        "Hello there.\nBye now.",
        RewriteOptions::default(),
    );

    let report = session
        .rewrite("Hello there", "make it formal", None)
        .expect("first rewrite");
    assert_eq!(report.replaced_count(), 1);
    session
        .rewrite("Bye now", "shorter goodbye", Some("tone: friendly"))
        .expect("second rewrite");
    assert_eq!(session.document(), "Good evening.\nSee you.");
    assert_eq!(session.history().len(), 3);

    assert_eq!(session.back(), Some("Good evening.\nBye now."));
    assert_eq!(session.back(), Some("Hello there.\nBye now."));
    assert_eq!(session.back(), None);
    assert_eq!(session.forward(), Some("Good evening.\nBye now."));
}

#[test]
fn rewrite_rejects_absent_target_without_calling_the_model() {
    let mut session = DocumentSession::new(
        ScriptedService::always(Ok("unused")),
        "alpha beta",
        RewriteOptions::default(),
    );

    let err = session
        .rewrite("gamma", "anything", None)
        .expect_err("target is absent");
    assert!(err.to_string().contains("does not occur"));
    assert_eq!(session.document(), "alpha beta");
}
