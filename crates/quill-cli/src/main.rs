mod dispatch;
mod review_session;
mod runtime_context;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use quill_config::{
    CliOverrides, CreateModeSetting, OnErrorSetting, ProviderSetting, ReasoningSetting,
};
use quill_core::{
    DocumentSession, PipelineOptions, ProgressMode, apply_batch, load_batch, plan_and_apply,
    save_batch,
};
use quill_edit::{Edit, TextEditor};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Auto,
    Ollama,
    Openai,
}

impl ProviderArg {
    fn as_setting(self) -> ProviderSetting {
        match self {
            ProviderArg::Auto => ProviderSetting::Auto,
            ProviderArg::Ollama => ProviderSetting::Ollama,
            ProviderArg::Openai => ProviderSetting::Openai,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReasoningArg {
    Low,
    Medium,
    High,
}

impl ReasoningArg {
    fn as_setting(self) -> ReasoningSetting {
        match self {
            ReasoningArg::Low => ReasoningSetting::Low,
            ReasoningArg::Medium => ReasoningSetting::Medium,
            ReasoningArg::High => ReasoningSetting::High,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CreateModeArg {
    Touch,
    WriteReplace,
}

impl CreateModeArg {
    fn as_setting(self) -> CreateModeSetting {
        match self {
            CreateModeArg::Touch => CreateModeSetting::Touch,
            CreateModeArg::WriteReplace => CreateModeSetting::WriteReplace,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "quill", version, about = "Plan and apply file edits with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Default, Args)]
struct CommonArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    verbose: bool,
    #[arg(long)]
    no_progress: bool,
}

#[derive(Debug, Clone, Default, Args)]
struct LlmArgs {
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,
    #[arg(long)]
    ollama_url: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, value_enum)]
    reasoning: Option<ReasoningArg>,
    /// Oracle calls allowed per plan before giving up.
    #[arg(long)]
    max_attempts: Option<usize>,
}

#[derive(Debug, Clone, Default, Args)]
struct ApplyArgs {
    /// Attempt every operation instead of stopping at the first failure.
    #[arg(long)]
    continue_on_error: bool,
    #[arg(long, value_enum)]
    create_mode: Option<CreateModeArg>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Plan edits for a prompt and print the batch as JSON.
    Plan {
        prompt: String,
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Apply a saved edit batch.
    Apply {
        batch: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        apply: ApplyArgs,
    },
    /// Plan edits for a prompt and apply them.
    Run {
        prompt: String,
        /// Print the planned batch without touching any file.
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        apply: ApplyArgs,
    },
    /// Apply search/replace pairs to a file in memory.
    Edit {
        file: PathBuf,
        /// JSON array of {"search": .., "replace": ..} objects.
        #[arg(long)]
        edits: String,
        #[arg(long)]
        in_place: bool,
        #[arg(long)]
        verbose: bool,
    },
    /// Rewrite one piece of a file with model-generated text.
    Rewrite {
        file: PathBuf,
        #[arg(long)]
        target: String,
        #[arg(long)]
        prompt: String,
        /// Extra reference material for the model.
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        in_place: bool,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Review a saved edit batch operation by operation.
    Review {
        batch: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        apply: ApplyArgs,
    },
}

fn cli_overrides(common: &CommonArgs, llm: &LlmArgs, apply: &ApplyArgs) -> CliOverrides {
    CliOverrides {
        provider: llm.provider.map(ProviderArg::as_setting),
        ollama_url: llm.ollama_url.clone(),
        model: llm.model.clone(),
        reasoning: llm.reasoning.map(ReasoningArg::as_setting),
        max_attempts: llm.max_attempts,
        on_error: apply.continue_on_error.then_some(OnErrorSetting::Continue),
        create_mode: apply.create_mode.map(CreateModeArg::as_setting),
        verbose: common.verbose.then_some(true),
        no_progress: common.no_progress.then_some(true),
    }
}

fn plan_command(
    prompt: String,
    output: Option<PathBuf>,
    common: CommonArgs,
    llm: LlmArgs,
) -> Result<()> {
    let overrides = cli_overrides(&common, &llm, &ApplyArgs::default());
    let settings = runtime_context::resolve_config(common.config, &overrides)?;
    let planner = runtime_context::build_planner(&settings)?;
    let request = runtime_context::build_plan_request(&settings, prompt, overrides.model);
    let progress_mode = runtime_context::resolved_progress_mode(&settings);

    if !matches!(progress_mode, ProgressMode::Silent) {
        eprintln!("[quill] planning edits");
    }
    let batch = planner.plan(&request)?;
    if !matches!(progress_mode, ProgressMode::Silent) {
        eprintln!("[quill] planned {} edit operations", batch.len());
    }

    match output {
        Some(path) => {
            save_batch(&path, &batch)?;
            println!("{}", path.display());
        }
        None => println!(
            "{}",
            batch
                .to_json_pretty()
                .context("failed to serialize edit batch")?
        ),
    }
    Ok(())
}

fn apply_command(batch: PathBuf, common: CommonArgs, apply: ApplyArgs) -> Result<()> {
    let overrides = cli_overrides(&common, &LlmArgs::default(), &apply);
    let settings = runtime_context::resolve_config(common.config, &overrides)?;
    let applier = runtime_context::build_applier(&settings);
    let progress_mode = runtime_context::resolved_progress_mode(&settings);

    let edits = load_batch(&batch)?;
    let report = apply_batch(
        &applier,
        &edits,
        runtime_context::failure_policy(settings.on_error),
        progress_mode,
    )
    .with_context(|| format!("failed applying {}", batch.display()))?;

    println!(
        "applied {}/{} edit operations",
        report.applied_count(),
        report.operations.len()
    );
    Ok(())
}

fn run_command(
    prompt: String,
    dry_run: bool,
    common: CommonArgs,
    llm: LlmArgs,
    apply: ApplyArgs,
) -> Result<()> {
    let overrides = cli_overrides(&common, &llm, &apply);
    let settings = runtime_context::resolve_config(common.config, &overrides)?;
    let planner = runtime_context::build_planner(&settings)?;
    let applier = runtime_context::build_applier(&settings);
    let request = runtime_context::build_plan_request(&settings, prompt, overrides.model);
    let options = PipelineOptions {
        failure_policy: runtime_context::failure_policy(settings.on_error),
        dry_run,
        progress_mode: runtime_context::resolved_progress_mode(&settings),
    };

    let outcome = plan_and_apply(&planner, &applier, &request, &options)?;
    match outcome.report {
        Some(report) => println!(
            "applied {}/{} edit operations",
            report.applied_count(),
            report.operations.len()
        ),
        None => println!(
            "{}",
            outcome
                .batch
                .to_json_pretty()
                .context("failed to serialize edit batch")?
        ),
    }
    Ok(())
}

fn edit_command(file: PathBuf, edits: String, in_place: bool, verbose: bool) -> Result<()> {
    let pairs: Vec<Edit> =
        serde_json::from_str(&edits).context("failed parsing --edits as a JSON array")?;
    let document = fs::read_to_string(&file)
        .with_context(|| format!("failed reading {}", file.display()))?;

    let mut editor = TextEditor::new(document);
    let report = editor.apply_edits(&pairs);
    if verbose {
        eprintln!(
            "[quill] {} replaced, {} skipped",
            report.replaced_count(),
            report.skipped_count()
        );
    }

    if in_place {
        fs::write(&file, editor.document())
            .with_context(|| format!("failed writing {}", file.display()))?;
    } else {
        print!("{}", editor.document());
    }
    Ok(())
}

fn rewrite_command(
    file: PathBuf,
    target: String,
    prompt: String,
    context: Option<String>,
    in_place: bool,
    common: CommonArgs,
    llm: LlmArgs,
) -> Result<()> {
    let overrides = cli_overrides(&common, &llm, &ApplyArgs::default());
    let settings = runtime_context::resolve_config(common.config, &overrides)?;
    let router = runtime_context::build_router(&settings)?;
    let options = runtime_context::build_rewrite_options(&settings, overrides.model);
    let progress_mode = runtime_context::resolved_progress_mode(&settings);

    let document = fs::read_to_string(&file)
        .with_context(|| format!("failed reading {}", file.display()))?;
    let mut session = DocumentSession::new(router, document, options);

    if !matches!(progress_mode, ProgressMode::Silent) {
        eprintln!("[quill] rewriting {}", file.display());
    }
    let report = session
        .rewrite(&target, &prompt, context.as_deref())
        .with_context(|| format!("failed rewriting {}", file.display()))?;
    if matches!(progress_mode, ProgressMode::Verbose) {
        eprintln!("[quill] {} replaced", report.replaced_count());
    }

    if in_place {
        fs::write(&file, session.document())
            .with_context(|| format!("failed writing {}", file.display()))?;
    } else {
        print!("{}", session.document());
    }
    Ok(())
}

fn review_command(batch: PathBuf, common: CommonArgs, apply: ApplyArgs) -> Result<()> {
    let overrides = cli_overrides(&common, &LlmArgs::default(), &apply);
    let settings = runtime_context::resolve_config(common.config, &overrides)?;
    let applier = runtime_context::build_applier(&settings);
    review_session::run(&batch, &applier)
}

fn init_tracing(cli: &Cli) {
    // RUST_LOG overrides; --verbose => debug; else warn
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let verbose = match &cli.command {
            Commands::Plan { common, .. }
            | Commands::Apply { common, .. }
            | Commands::Run { common, .. }
            | Commands::Rewrite { common, .. }
            | Commands::Review { common, .. } => common.verbose,
            Commands::Edit { verbose, .. } => *verbose,
        };
        EnvFilter::new(if verbose { "quill=debug" } else { "warn" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    dispatch::execute(cli)
}
