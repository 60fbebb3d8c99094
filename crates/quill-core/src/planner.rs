use crate::retry::{AttemptFailure, RetryPolicy, retry_with_policy};
use quill_edit::EditBatch;
use quill_llm::{
    GenerateRequest, GenerationService, ProviderSelection, ReasoningEffort, ResponseSchema,
    generate_structured,
};
use thiserror::Error;
use tracing::{debug, info};

pub const EDIT_BATCH_SCHEMA_NAME: &str = "edit_batch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub user_prompt: String,
    /// Model identifier override; `None` uses the provider's configured model.
    pub model: Option<String>,
    pub reasoning: ReasoningEffort,
    pub selection: ProviderSelection,
}

impl PlanRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            model: None,
            reasoning: ReasoningEffort::default(),
            selection: ProviderSelection::Auto,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planning gave up after {attempts} attempts: {}", last_failure(.failures))]
    Exhausted {
        attempts: usize,
        failures: Vec<AttemptFailure>,
    },

    #[error("failed to build the edit batch schema")]
    Schema(#[source] serde_json::Error),
}

fn last_failure(failures: &[AttemptFailure]) -> &str {
    failures
        .last()
        .map(|f| f.error.as_str())
        .unwrap_or("no attempt was made")
}

/// Turns a natural-language plan into an [`EditBatch`] by asking the
/// generation service for structured output.
pub struct Planner<S> {
    pub service: S,
    pub retry: RetryPolicy,
}

impl<S: GenerationService> Planner<S> {
    pub fn new(service: S, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }

    /// Any failure of a single call (transport, malformed JSON, wrong shape)
    /// spends one attempt. No semantic checks are made on the batch.
    pub fn plan(&self, request: &PlanRequest) -> Result<EditBatch, PlanError> {
        let schema = ResponseSchema {
            name: EDIT_BATCH_SCHEMA_NAME.to_string(),
            schema: EditBatch::json_schema().map_err(PlanError::Schema)?,
        };
        let message = GenerateRequest::new(build_plan_directive(&request.user_prompt))
            .with_reasoning(request.reasoning);

        let batch = retry_with_policy(&self.retry, |attempt| {
            debug!(attempt, selection = ?request.selection, "requesting edit batch");
            generate_structured::<S, EditBatch>(
                &self.service,
                request.selection,
                &message,
                schema.clone(),
                request.model.as_deref(),
            )
        })
        .map_err(|exhausted| PlanError::Exhausted {
            attempts: exhausted.attempts,
            failures: exhausted.failures,
        })?;

        info!(operations = batch.len(), "edit batch planned");
        Ok(batch)
    }
}

pub fn build_plan_directive(user_prompt: &str) -> String {
    format!(
        "Carry out the plan below by writing a list of file edit operations.\n\
         1. Give every target file as an absolute path.\n\
         2. `search` must match the target file exactly. It has to be text that literally exists in the current file.\n\
         3. Use an empty `search` for Create and Delete.\n\
         4. Use an empty `replace` for Delete.\n\
         5. `operation_kind` is one of Create, Edit, Delete.\n\
         \n\
         Format:\n\
         - edits: list of EditOperation\n\
         - EditOperation\n\
         \x20 - target_path: absolute path of the file\n\
         \x20 - search: exact text to replace, multi-line allowed, must appear in the original file\n\
         \x20 - replace: replacement text, multi-line allowed\n\
         \x20 - operation_kind: Create | Edit | Delete\n\
         \n\
         Plan:\n\
         {user_prompt}"
    )
}

#[cfg(test)]
mod tests {
    use super::build_plan_directive;

    #[test]
    fn directive_ends_with_the_prompt_verbatim() {
        let prompt = "rename foo to bar\n  in /src/a.py";
        let directive = build_plan_directive(prompt);
        assert!(directive.ends_with("Plan:\nrename foo to bar\n  in /src/a.py"));
    }

    #[test]
    fn directive_text() {
        insta::assert_snapshot!(build_plan_directive("delete /tmp/old.txt"), @r"
        Carry out the plan below by writing a list of file edit operations.
        1. Give every target file as an absolute path.
        2. `search` must match the target file exactly. It has to be text that literally exists in the current file.
        3. Use an empty `search` for Create and Delete.
        4. Use an empty `replace` for Delete.
        5. `operation_kind` is one of Create, Edit, Delete.

        Format:
        - edits: list of EditOperation
        - EditOperation
          - target_path: absolute path of the file
          - search: exact text to replace, multi-line allowed, must appear in the original file
          - replace: replacement text, multi-line allowed
          - operation_kind: Create | Edit | Delete

        Plan:
        delete /tmp/old.txt
        ");
    }
}
