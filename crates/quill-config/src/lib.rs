use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "quill.json";
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSetting {
    Auto,
    Ollama,
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSetting {
    Auto,
    Silent,
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSetting {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnErrorSetting {
    Abort,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateModeSetting {
    Touch,
    WriteReplace,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub provider: Option<ProviderSetting>,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub reasoning: Option<ReasoningSetting>,
    pub max_attempts: Option<usize>,
    pub on_error: Option<OnErrorSetting>,
    pub create_mode: Option<CreateModeSetting>,
    pub verbose: Option<bool>,
    pub progress: Option<ProgressSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvConfig {
    pub provider: Option<ProviderSetting>,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub reasoning: Option<ReasoningSetting>,
    pub max_attempts: Option<usize>,
    pub on_error: Option<OnErrorSetting>,
    pub create_mode: Option<CreateModeSetting>,
    pub verbose: Option<bool>,
    pub progress: Option<ProgressSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    pub provider: Option<ProviderSetting>,
    pub ollama_url: Option<String>,
    pub model: Option<String>,
    pub reasoning: Option<ReasoningSetting>,
    pub max_attempts: Option<usize>,
    pub on_error: Option<OnErrorSetting>,
    pub create_mode: Option<CreateModeSetting>,
    pub verbose: Option<bool>,
    pub no_progress: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub provider: ProviderSetting,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub reasoning: ReasoningSetting,
    pub max_attempts: usize,
    pub on_error: OnErrorSetting,
    pub create_mode: CreateModeSetting,
    pub verbose: bool,
    pub progress: ProgressSetting,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderSetting::Auto,
            ollama_url: "http://127.0.0.1:11434".to_string(),
            ollama_model: "gpt-oss:20b".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            openai_model: "o4-mini".to_string(),
            reasoning: ReasoningSetting::Low,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            on_error: OnErrorSetting::Abort,
            create_mode: CreateModeSetting::Touch,
            verbose: false,
            progress: ProgressSetting::Auto,
        }
    }
}

/// `<config_dir>/quill/quill.json`, when the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quill").join(CONFIG_FILE_NAME))
}

pub fn load_file_config(explicit_path: Option<&Path>, cwd: &Path) -> Result<Option<FileConfig>> {
    load_file_config_with_fallback(explicit_path, cwd, user_config_path().as_deref())
}

/// Lookup order: explicit path, `quill.json` in `cwd`, then the user config.
/// A missing explicit path is an error; missing implicit files are not.
pub fn load_file_config_with_fallback(
    explicit_path: Option<&Path>,
    cwd: &Path,
    user_config: Option<&Path>,
) -> Result<Option<FileConfig>> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => {
            let local = cwd.join(CONFIG_FILE_NAME);
            match user_config {
                _ if local.exists() => local,
                Some(user) if user.exists() => user.to_path_buf(),
                _ => return Ok(None),
            }
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed reading config file {}", path.display()))?;
    let parsed: FileConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing config file {}", path.display()))?;
    Ok(Some(parsed))
}

impl EnvConfig {
    pub fn from_current_env() -> Self {
        Self {
            provider: env::var("QUILL_PROVIDER")
                .ok()
                .and_then(|v| parse_provider(&v)),
            ollama_url: env::var("QUILL_OLLAMA_URL").ok(),
            ollama_model: env::var("QUILL_OLLAMA_MODEL").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_model: env::var("QUILL_MODEL").ok(),
            reasoning: env::var("QUILL_REASONING")
                .ok()
                .and_then(|v| parse_reasoning(&v)),
            max_attempts: env::var("QUILL_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            on_error: env::var("QUILL_ON_ERROR")
                .ok()
                .and_then(|v| parse_on_error(&v)),
            create_mode: env::var("QUILL_CREATE_MODE")
                .ok()
                .and_then(|v| parse_create_mode(&v)),
            verbose: env::var("QUILL_VERBOSE").ok().and_then(|v| parse_bool(&v)),
            progress: env::var("QUILL_PROGRESS")
                .ok()
                .and_then(|v| parse_progress(&v)),
        }
    }
}

pub fn resolve_settings(
    cli: &CliOverrides,
    env_cfg: &EnvConfig,
    file_cfg: Option<&FileConfig>,
) -> Settings {
    let base = Settings::default();

    let provider = cli
        .provider
        .or(env_cfg.provider)
        .or(file_cfg.and_then(|c| c.provider))
        .unwrap_or(base.provider);

    let ollama_url = cli
        .ollama_url
        .clone()
        .or_else(|| env_cfg.ollama_url.clone())
        .or_else(|| file_cfg.and_then(|c| c.ollama_url.clone()))
        .unwrap_or(base.ollama_url);

    let ollama_model = cli
        .model
        .clone()
        .or_else(|| env_cfg.ollama_model.clone())
        .or_else(|| file_cfg.and_then(|c| c.ollama_model.clone()))
        .unwrap_or(base.ollama_model);

    let openai_base_url = env_cfg
        .openai_base_url
        .clone()
        .or_else(|| file_cfg.and_then(|c| c.openai_base_url.clone()))
        .unwrap_or(base.openai_base_url);

    let openai_api_key = env_cfg
        .openai_api_key
        .clone()
        .or_else(|| file_cfg.and_then(|c| c.openai_api_key.clone()))
        .or(base.openai_api_key);

    let openai_model = cli
        .model
        .clone()
        .or_else(|| env_cfg.openai_model.clone())
        .or_else(|| file_cfg.and_then(|c| c.openai_model.clone()))
        .unwrap_or(base.openai_model);

    let reasoning = cli
        .reasoning
        .or(env_cfg.reasoning)
        .or(file_cfg.and_then(|c| c.reasoning))
        .unwrap_or(base.reasoning);

    let max_attempts = cli
        .max_attempts
        .or(env_cfg.max_attempts)
        .or(file_cfg.and_then(|c| c.max_attempts))
        .unwrap_or(base.max_attempts)
        .max(1);

    let on_error = cli
        .on_error
        .or(env_cfg.on_error)
        .or(file_cfg.and_then(|c| c.on_error))
        .unwrap_or(base.on_error);

    let create_mode = cli
        .create_mode
        .or(env_cfg.create_mode)
        .or(file_cfg.and_then(|c| c.create_mode))
        .unwrap_or(base.create_mode);

    let verbose = cli
        .verbose
        .or(env_cfg.verbose)
        .or(file_cfg.and_then(|c| c.verbose))
        .unwrap_or(base.verbose);

    let mut progress = env_cfg
        .progress
        .or(file_cfg.and_then(|c| c.progress))
        .unwrap_or(base.progress);

    if cli.no_progress == Some(true) {
        progress = ProgressSetting::Silent;
    }

    Settings {
        provider,
        ollama_url,
        ollama_model,
        openai_base_url,
        openai_api_key,
        openai_model,
        reasoning,
        max_attempts,
        on_error,
        create_mode,
        verbose,
        progress,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_provider(input: &str) -> Option<ProviderSetting> {
    match input.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(ProviderSetting::Auto),
        "ollama" => Some(ProviderSetting::Ollama),
        "openai" | "openai-compatible" => Some(ProviderSetting::Openai),
        _ => None,
    }
}

fn parse_progress(input: &str) -> Option<ProgressSetting> {
    match input.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(ProgressSetting::Auto),
        "silent" => Some(ProgressSetting::Silent),
        "verbose" => Some(ProgressSetting::Verbose),
        _ => None,
    }
}

fn parse_reasoning(input: &str) -> Option<ReasoningSetting> {
    match input.trim().to_ascii_lowercase().as_str() {
        "low" => Some(ReasoningSetting::Low),
        "medium" => Some(ReasoningSetting::Medium),
        "high" => Some(ReasoningSetting::High),
        _ => None,
    }
}

fn parse_on_error(input: &str) -> Option<OnErrorSetting> {
    match input.trim().to_ascii_lowercase().as_str() {
        "abort" => Some(OnErrorSetting::Abort),
        "continue" => Some(OnErrorSetting::Continue),
        _ => None,
    }
}

fn parse_create_mode(input: &str) -> Option<CreateModeSetting> {
    match input.trim().to_ascii_lowercase().as_str() {
        "touch" => Some(CreateModeSetting::Touch),
        "write-replace" | "write_replace" => Some(CreateModeSetting::WriteReplace),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CliOverrides, CreateModeSetting, EnvConfig, FileConfig, OnErrorSetting, ProgressSetting,
        ProviderSetting, ReasoningSetting, load_file_config, load_file_config_with_fallback,
        parse_create_mode, resolve_settings,
    };
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn valid_config_parses() {
        let dir = tempdir().expect("tempdir should work");
        let path = dir.path().join("quill.json");
        fs::write(
            &path,
            r#"{"provider":"ollama","max_attempts":3,"on_error":"continue","create_mode":"write-replace"}"#,
        )
        .expect("write should work");

        let parsed = load_file_config(None, dir.path())
            .expect("parse should work")
            .expect("file should exist");
        assert_eq!(parsed.provider, Some(ProviderSetting::Ollama));
        assert_eq!(parsed.max_attempts, Some(3));
        assert_eq!(parsed.on_error, Some(OnErrorSetting::Continue));
        assert_eq!(parsed.create_mode, Some(CreateModeSetting::WriteReplace));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let dir = tempdir().expect("tempdir should work");
        let path = dir.path().join("quill.json");
        fs::write(&path, r#"{"unknown":1}"#).expect("write should work");

        let err = load_file_config(None, dir.path()).expect_err("parse should fail");
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn malformed_json_has_location() {
        let dir = tempdir().expect("tempdir should work");
        let path = dir.path().join("quill.json");
        fs::write(&path, "{\n  \"provider\":\n").expect("write should work");

        let err = load_file_config(None, dir.path()).expect_err("parse should fail");
        assert!(
            format!("{err:#}").contains("line") || format!("{err:#}").contains("column"),
            "expected location details, got: {err}"
        );
    }

    #[test]
    fn falls_back_to_user_config() {
        let project = tempdir().expect("tempdir should work");
        let home = tempdir().expect("tempdir should work");
        let user = home.path().join("quill.json");
        fs::write(&user, r#"{"reasoning":"high"}"#).expect("write should work");

        let parsed = load_file_config_with_fallback(None, project.path(), Some(&user))
            .expect("parse should work")
            .expect("user config should be used");
        assert_eq!(parsed.reasoning, Some(ReasoningSetting::High));

        fs::write(project.path().join("quill.json"), r#"{"reasoning":"medium"}"#)
            .expect("write should work");
        let parsed = load_file_config_with_fallback(None, project.path(), Some(&user))
            .expect("parse should work")
            .expect("local config should win");
        assert_eq!(parsed.reasoning, Some(ReasoningSetting::Medium));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempdir().expect("tempdir should work");
        let err = load_file_config_with_fallback(Some(&dir.path().join("nope.json")), dir.path(), None)
            .expect_err("explicit path must exist");
        assert!(format!("{err:#}").contains("failed reading config file"));
    }

    #[test]
    fn precedence_cli_env_file_defaults() {
        let file = FileConfig {
            provider: Some(ProviderSetting::Openai),
            progress: Some(ProgressSetting::Verbose),
            max_attempts: Some(2),
            reasoning: Some(ReasoningSetting::High),
            ..FileConfig::default()
        };

        let env_cfg = EnvConfig {
            provider: Some(ProviderSetting::Ollama),
            max_attempts: Some(4),
            ..EnvConfig::default()
        };

        let cli = CliOverrides {
            provider: Some(ProviderSetting::Auto),
            no_progress: Some(true),
            ..CliOverrides::default()
        };

        let resolved = resolve_settings(&cli, &env_cfg, Some(&file));
        assert_eq!(resolved.provider, ProviderSetting::Auto);
        assert_eq!(resolved.max_attempts, 4);
        assert_eq!(resolved.reasoning, ReasoningSetting::High);
        assert_eq!(resolved.progress, ProgressSetting::Silent);
        assert_eq!(resolved.on_error, OnErrorSetting::Abort);
        assert_eq!(resolved.create_mode, CreateModeSetting::Touch);
    }

    #[test]
    fn zero_attempts_is_clamped() {
        let cli = CliOverrides {
            max_attempts: Some(0),
            ..CliOverrides::default()
        };
        let resolved = resolve_settings(&cli, &EnvConfig::default(), None);
        assert_eq!(resolved.max_attempts, 1);
    }

    #[test]
    fn create_mode_accepts_both_spellings() {
        assert_eq!(
            parse_create_mode("write_replace"),
            Some(CreateModeSetting::WriteReplace)
        );
        assert_eq!(parse_create_mode("Touch"), Some(CreateModeSetting::Touch));
        assert_eq!(parse_create_mode("inject"), None);
    }
}
