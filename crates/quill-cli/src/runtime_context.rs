use anyhow::{Context, Result, anyhow};
use quill_config::{
    CliOverrides, CreateModeSetting, EnvConfig, OnErrorSetting, ProgressSetting, ProviderSetting,
    ReasoningSetting, Settings, load_file_config, resolve_settings,
};
use quill_core::{PlanRequest, Planner, ProgressMode, RetryPolicy, RewriteOptions};
use quill_edit::{Applier, CreateMode, FailurePolicy};
use quill_llm::{
    GenerateRequest, LlmClient, ProviderRouter, ProviderSelection, ReachabilityProbe,
    ReasoningEffort,
};
use quill_llm_ollama::OllamaClient;
use quill_llm_openai::OpenAiCompatibleClient;
use std::path::PathBuf;

pub(crate) struct OllamaProbe {
    client: OllamaClient,
}

pub(crate) type QuillRouter = ProviderRouter<OllamaClient, MaybeOpenAiClient, OllamaProbe>;

impl ReachabilityProbe for OllamaProbe {
    fn ollama_reachable(&self) -> bool {
        self.client.is_reachable()
    }
}

pub(crate) struct MaybeOpenAiClient {
    inner: Option<OpenAiCompatibleClient>,
}

impl LlmClient for MaybeOpenAiClient {
    fn generate(&self, req: &GenerateRequest, model: &str) -> Result<String> {
        let client = self.inner.as_ref().ok_or_else(|| {
            anyhow!("OPENAI_API_KEY is required for the OpenAI-compatible provider")
        })?;
        client.generate(req, model)
    }
}

pub(crate) fn provider_to_selection(provider: ProviderSetting) -> ProviderSelection {
    match provider {
        ProviderSetting::Auto => ProviderSelection::Auto,
        ProviderSetting::Ollama => ProviderSelection::Ollama,
        ProviderSetting::Openai => ProviderSelection::OpenAiCompatible,
    }
}

fn reasoning_effort(reasoning: ReasoningSetting) -> ReasoningEffort {
    match reasoning {
        ReasoningSetting::Low => ReasoningEffort::Low,
        ReasoningSetting::Medium => ReasoningEffort::Medium,
        ReasoningSetting::High => ReasoningEffort::High,
    }
}

pub(crate) fn failure_policy(on_error: OnErrorSetting) -> FailurePolicy {
    match on_error {
        OnErrorSetting::Abort => FailurePolicy::Abort,
        OnErrorSetting::Continue => FailurePolicy::Continue,
    }
}

fn create_mode(setting: CreateModeSetting) -> CreateMode {
    match setting {
        CreateModeSetting::Touch => CreateMode::Touch,
        CreateModeSetting::WriteReplace => CreateMode::WriteReplace,
    }
}

pub(crate) fn resolved_progress_mode(settings: &Settings) -> ProgressMode {
    match settings.progress {
        ProgressSetting::Silent => ProgressMode::Silent,
        ProgressSetting::Verbose => ProgressMode::Verbose,
        ProgressSetting::Auto => {
            if settings.verbose {
                ProgressMode::Verbose
            } else {
                ProgressMode::Minimal
            }
        }
    }
}

pub(crate) fn resolve_config(
    config: Option<PathBuf>,
    cli_overrides: &CliOverrides,
) -> Result<Settings> {
    let cwd = std::env::current_dir().context("failed resolving current directory")?;
    let file_cfg = load_file_config(config.as_deref(), &cwd)?;
    let env_cfg = EnvConfig::from_current_env();
    Ok(resolve_settings(cli_overrides, &env_cfg, file_cfg.as_ref()))
}

pub(crate) fn build_router(settings: &Settings) -> Result<QuillRouter> {
    let ollama_client = OllamaClient::new(settings.ollama_url.clone())?;
    let openai_client = MaybeOpenAiClient {
        inner: settings.openai_api_key.clone().map(|api_key| {
            OpenAiCompatibleClient::from_parts(settings.openai_base_url.clone(), api_key)
        }),
    };

    Ok(ProviderRouter {
        ollama: ollama_client.clone(),
        openai: openai_client,
        reachability: OllamaProbe {
            client: ollama_client,
        },
        ollama_model: settings.ollama_model.clone(),
        openai_model: settings.openai_model.clone(),
    })
}

pub(crate) fn build_planner(settings: &Settings) -> Result<Planner<QuillRouter>> {
    Ok(Planner::new(
        build_router(settings)?,
        RetryPolicy::new(settings.max_attempts),
    ))
}

pub(crate) fn build_applier(settings: &Settings) -> Applier {
    Applier::new(create_mode(settings.create_mode))
}

pub(crate) fn build_plan_request(
    settings: &Settings,
    prompt: String,
    model_override: Option<String>,
) -> PlanRequest {
    PlanRequest {
        user_prompt: prompt,
        model: model_override,
        reasoning: reasoning_effort(settings.reasoning),
        selection: provider_to_selection(settings.provider),
    }
}

pub(crate) fn build_rewrite_options(
    settings: &Settings,
    model_override: Option<String>,
) -> RewriteOptions {
    RewriteOptions {
        selection: provider_to_selection(settings.provider),
        model: model_override,
        reasoning: reasoning_effort(settings.reasoning),
        ..RewriteOptions::default()
    }
}
