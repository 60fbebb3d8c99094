use anyhow::{Context, Result, bail};
use quill_edit::{DEFAULT_EDIT_LOG_LEN, Edit, EditLog, EditReport, TextEditor};
use quill_llm::{
    GenerateRequest, GenerationService, ProviderSelection, ReasoningEffort, generate_text,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub selection: ProviderSelection,
    pub model: Option<String>,
    pub reasoning: ReasoningEffort,
    pub history_len: usize,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            selection: ProviderSelection::Auto,
            model: None,
            reasoning: ReasoningEffort::default(),
            history_len: DEFAULT_EDIT_LOG_LEN,
        }
    }
}

/// An in-memory document rewritten piece by piece with model-generated
/// replacements. Every successful rewrite is recorded so it can be undone.
pub struct DocumentSession<S> {
    service: S,
    options: RewriteOptions,
    editor: TextEditor,
    history: EditLog,
}

impl<S: GenerationService> DocumentSession<S> {
    pub fn new(service: S, document: impl Into<String>, options: RewriteOptions) -> Self {
        let editor = TextEditor::new(document);
        let mut history = EditLog::new(options.history_len);
        history.push(editor.document());
        Self {
            service,
            options,
            editor,
            history,
        }
    }

    pub fn document(&self) -> &str {
        self.editor.document()
    }

    pub fn history(&self) -> &EditLog {
        &self.history
    }

    /// Replaces every occurrence of `target_text` with text generated from
    /// `instruction`. The document is only sent to the model when the target
    /// is actually present.
    pub fn rewrite(
        &mut self,
        target_text: &str,
        instruction: &str,
        extra_context: Option<&str>,
    ) -> Result<EditReport> {
        if target_text.is_empty() {
            bail!("rewrite target text is empty");
        }
        if !self.editor.document().contains(target_text) {
            bail!("rewrite target text does not occur in the document");
        }

        let message = build_rewrite_directive(
            target_text,
            instruction,
            self.editor.document(),
            extra_context,
        );
        let request = GenerateRequest::new(message).with_reasoning(self.options.reasoning);
        let response = generate_text(
            &self.service,
            self.options.selection,
            &request,
            self.options.model.as_deref(),
        )
        .context("failed to generate replacement text")?;
        debug!(
            provider = ?response.provider,
            model = %response.model,
            "replacement text received"
        );

        let report = self
            .editor
            .apply_edits(&[Edit::new(target_text, response.text)]);
        if report.replaced_count() > 0 {
            self.history.push(self.editor.document());
        }
        Ok(report)
    }

    /// Steps back to the previous snapshot. `None` at the oldest one.
    pub fn back(&mut self) -> Option<&str> {
        let snapshot = self.history.prev()?.to_string();
        self.editor.set_document(snapshot);
        Some(self.editor.document())
    }

    pub fn forward(&mut self) -> Option<&str> {
        let snapshot = self.history.next()?.to_string();
        self.editor.set_document(snapshot);
        Some(self.editor.document())
    }

    pub fn into_document(self) -> String {
        self.editor.into_document()
    }
}

pub fn build_rewrite_directive(
    target_text: &str,
    instruction: &str,
    document: &str,
    extra_context: Option<&str>,
) -> String {
    let mut out = format!(
        "Rewrite the target text below according to the instruction.\n\
         Reply with the replacement for the target text only. Do not repeat the rest of the document and do not add commentary.\n\
         \n\
         Instruction:\n\
         {instruction}\n\
         \n\
         Target text:\n\
         {target_text}\n\
         \n\
         Document:\n\
         {document}"
    );
    if let Some(context) = extra_context.filter(|c| !c.trim().is_empty()) {
        out.push_str("\n\nReference material:\n");
        out.push_str(context);
    }
    out
}
