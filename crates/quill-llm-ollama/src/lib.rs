use anyhow::{Context, Result, anyhow};
use quill_llm::{GenerateRequest, LlmClient, ToolDefinition};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct OllamaClient {
    pub base_url: String,
    pub timeout: Duration,
    pub request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: String) -> Result<Self> {
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(300),
        })
    }

    pub fn is_reachable(&self) -> bool {
        let client = match Client::builder().timeout(self.timeout).build() {
            Ok(c) => c,
            Err(_) => return false,
        };

        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        client
            .get(url)
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    think: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool<'a>>,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

/// Greedy sampling so repeated plans for the same prompt stay stable.
#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

fn build_body<'a>(req: &'a GenerateRequest, model: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![Message {
            role: "user",
            content: &req.message,
        }],
        stream: false,
        think: req.reasoning.as_str(),
        format: req.response_schema.as_ref().map(|s| &s.schema),
        tools: req
            .tools
            .iter()
            .map(|function| Tool {
                kind: "function",
                function,
            })
            .collect(),
        options: SamplingOptions {
            temperature: 0.0,
            top_p: 1.0,
            top_k: 0,
        },
    }
}

impl LlmClient for OllamaClient {
    fn generate(&self, req: &GenerateRequest, model: &str) -> Result<String> {
        let client = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = client
            .post(url)
            .json(&build_body(req, model))
            .send()
            .context("failed calling Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(anyhow!("Ollama request failed ({status}): {body}"));
        }

        let parsed: ChatResponse = response
            .json()
            .context("failed to decode Ollama response")?;

        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::{OllamaClient, build_body};
    use quill_llm::{GenerateRequest, LlmClient, ReasoningEffort, ResponseSchema, ToolDefinition};

    #[test]
    fn body_carries_schema_reasoning_and_tools() {
        let req = GenerateRequest::new("plan it")
            .with_reasoning(ReasoningEffort::High)
            .with_tools(vec![ToolDefinition {
                name: "web_search".to_string(),
                description: "Search the web".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            }])
            .with_schema(ResponseSchema {
                name: "edit_batch".to_string(),
                schema: serde_json::json!({"type": "object", "required": ["edits"]}),
            });

        let body = serde_json::to_value(build_body(&req, "gpt-oss:20b")).expect("serialize");
        assert_eq!(body["model"], "gpt-oss:20b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["think"], "high");
        assert_eq!(body["format"]["required"][0], "edits");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "web_search");
        assert_eq!(body["messages"][0]["content"], "plan it");
        assert_eq!(body["options"]["temperature"], 0.0);
    }

    #[test]
    fn plain_body_omits_format_and_tools() {
        let req = GenerateRequest::new("hello");
        let body = serde_json::to_value(build_body(&req, "m")).expect("serialize");
        assert!(body.get("format").is_none());
        assert!(body.get("tools").is_none());
        assert_eq!(body["think"], "low");
    }

    #[test]
    #[ignore]
    fn live_ollama_generate_if_enabled() {
        if std::env::var("QUILL_RUN_LIVE_TESTS").ok().as_deref() != Some("1") {
            return;
        }

        let base = std::env::var("QUILL_OLLAMA_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
        let model =
            std::env::var("QUILL_OLLAMA_MODEL").unwrap_or_else(|_| "gpt-oss:20b".to_string());

        let client = OllamaClient::new(base).expect("client should build");
        let out = client
            .generate(&GenerateRequest::new("Reply with the word ok."), &model)
            .expect("ollama live request should succeed");
        assert!(!out.trim().is_empty());
    }
}
