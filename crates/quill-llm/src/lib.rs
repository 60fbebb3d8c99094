use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAiCompatible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSelection {
    Auto,
    Ollama,
    OpenAiCompatible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub provider: Provider,
    pub model: String,
}

/// Reasoning-effort hint forwarded to the provider untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A tool the model may call. Forwarded to the provider; executing the
/// calls is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub message: String,
    pub reasoning: ReasoningEffort,
    pub tools: Vec<ToolDefinition>,
    pub response_schema: Option<ResponseSchema>,
}

impl GenerateRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reasoning: ReasoningEffort::default(),
            tools: Vec::new(),
            response_schema: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningEffort) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: String,
    pub provider: Provider,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: Provider,
    pub stage: &'static str,
    pub error: String,
}

#[derive(Debug, Error)]
#[error("LLM routing failed after {attempts:?}")]
pub struct ProviderRoutingError {
    pub attempts: Vec<ProviderAttempt>,
}

/// The provider answered, but not with an instance of the requested schema.
#[derive(Debug, Error)]
#[error("LLM output does not match schema `{schema}`: {reason}")]
pub struct StructuredOutputError {
    pub schema: String,
    pub reason: String,
    pub raw_excerpt: String,
}

pub trait LlmClient {
    fn generate(&self, req: &GenerateRequest, model: &str) -> Result<String>;
}

pub trait ReachabilityProbe {
    fn ollama_reachable(&self) -> bool;
}

pub trait GenerationService {
    fn candidate_chain(&self, selection: ProviderSelection) -> Vec<ProviderDescriptor>;
    fn generate(
        &self,
        selection: ProviderSelection,
        req: &GenerateRequest,
        model_override: Option<&str>,
    ) -> Result<GenerateResponse>;
}

/// Plain text generation. Whitespace-only output counts as a failure.
pub fn generate_text<S>(
    service: &S,
    selection: ProviderSelection,
    req: &GenerateRequest,
    model_override: Option<&str>,
) -> Result<GenerateResponse>
where
    S: GenerationService + ?Sized,
{
    let response = service.generate(selection, req, model_override)?;
    if response.text.trim().is_empty() {
        return Err(anyhow!(
            "{:?}:{} returned empty output",
            response.provider,
            response.model
        ));
    }
    Ok(response)
}

/// Asks for an instance of `schema` and decodes it into `T`.
///
/// Output that is not valid JSON or does not fit `T` is an error, never a
/// partially filled value.
pub fn generate_structured<S, T>(
    service: &S,
    selection: ProviderSelection,
    req: &GenerateRequest,
    schema: ResponseSchema,
    model_override: Option<&str>,
) -> Result<T>
where
    S: GenerationService + ?Sized,
    T: DeserializeOwned,
{
    let name = schema.name.clone();
    let request = req.clone().with_schema(schema);
    let response = service.generate(selection, &request, model_override)?;
    debug!(
        provider = ?response.provider,
        model = %response.model,
        bytes = response.text.len(),
        "structured response received"
    );
    Ok(decode_structured(&name, &response.text)?)
}

pub fn decode_structured<T: DeserializeOwned>(
    schema_name: &str,
    raw: &str,
) -> Result<T, StructuredOutputError> {
    let error = |reason: String| StructuredOutputError {
        schema: schema_name.to_string(),
        reason,
        raw_excerpt: excerpt(raw),
    };
    let payload = extract_json_payload(raw).map_err(|err| error(err.to_string()))?;
    serde_json::from_str(payload).map_err(|err| error(err.to_string()))
}

/// Strips a Markdown fence or surrounding prose from a JSON answer.
///
/// Text that already starts with `{` or `[` is taken as-is, so code fences
/// inside JSON string values survive.
pub fn extract_json_payload(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("LLM returned empty output"));
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if let Some(block) = extract_fenced_code(trimmed) {
        let block = block.trim();
        if block.is_empty() {
            return Err(anyhow!("LLM returned empty fenced output"));
        }
        return Ok(block);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(anyhow!("LLM output contains no JSON object")),
    }
}

/// Body between the first fence and the last one. Fences nested in the body
/// are kept.
fn extract_fenced_code(input: &str) -> Option<&str> {
    let start = input.find("```")?;
    let remainder = &input[start + 3..];
    let body_start = remainder.find('\n')? + 1;
    let body = &remainder[body_start..];
    let end = body.rfind("```")?;
    Some(&body[..end])
}

fn excerpt(raw: &str) -> String {
    const LIMIT: usize = 200;
    match raw.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}

pub struct ProviderRouter<O, P, R>
where
    O: LlmClient,
    P: LlmClient,
    R: ReachabilityProbe,
{
    pub ollama: O,
    pub openai: P,
    pub reachability: R,
    pub ollama_model: String,
    pub openai_model: String,
}

impl<O, P, R> ProviderRouter<O, P, R>
where
    O: LlmClient,
    P: LlmClient,
    R: ReachabilityProbe,
{
    fn call_provider(
        &self,
        provider: Provider,
        req: &GenerateRequest,
        model_override: Option<&str>,
    ) -> Result<GenerateResponse> {
        let (model, text) = match provider {
            Provider::Ollama => {
                let model = model_override.unwrap_or(&self.ollama_model);
                (model, self.ollama.generate(req, model)?)
            }
            Provider::OpenAiCompatible => {
                let model = model_override.unwrap_or(&self.openai_model);
                (model, self.openai.generate(req, model)?)
            }
        };
        Ok(GenerateResponse {
            text,
            provider,
            model: model.to_string(),
        })
    }
}

impl<O, P, R> GenerationService for ProviderRouter<O, P, R>
where
    O: LlmClient,
    P: LlmClient,
    R: ReachabilityProbe,
{
    fn candidate_chain(&self, selection: ProviderSelection) -> Vec<ProviderDescriptor> {
        let ollama = ProviderDescriptor {
            provider: Provider::Ollama,
            model: self.ollama_model.clone(),
        };
        let openai = ProviderDescriptor {
            provider: Provider::OpenAiCompatible,
            model: self.openai_model.clone(),
        };
        match selection {
            ProviderSelection::Ollama => vec![ollama],
            ProviderSelection::OpenAiCompatible => vec![openai],
            ProviderSelection::Auto => {
                if self.reachability.ollama_reachable() {
                    vec![ollama, openai]
                } else {
                    vec![openai]
                }
            }
        }
    }

    fn generate(
        &self,
        selection: ProviderSelection,
        req: &GenerateRequest,
        model_override: Option<&str>,
    ) -> Result<GenerateResponse> {
        let chain = self.candidate_chain(selection);
        let mut attempts = Vec::new();

        for entry in chain {
            match self.call_provider(entry.provider, req, model_override) {
                Ok(response) => return Ok(response),
                Err(err) => {
                    debug!(provider = ?entry.provider, error = %err, "provider call failed");
                    attempts.push(ProviderAttempt {
                        provider: entry.provider,
                        stage: "generate",
                        error: format!("{err:#}"),
                    })
                }
            }
        }

        Err(ProviderRoutingError { attempts }.into())
    }
}
