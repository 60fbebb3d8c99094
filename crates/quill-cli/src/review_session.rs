use anyhow::{Context, Result, anyhow, bail};
use quill_core::load_batch;
use quill_edit::{
    Applier, BatchReviewState, EditBatch, OperationId, OperationKind, OperationPatch,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

const HELP: &str = "commands: list | show N | search N TEXT | replace N TEXT | kind N KIND | ok N | apply N | apply-all | .exit
TEXT may use \\n for line breaks and may be empty";

/// Review progress on disk, together with the batch it was started from.
#[derive(Debug, Serialize, Deserialize)]
struct SavedReview {
    batch: EditBatch,
    review: BatchReviewState,
}

/// `batch.json` keeps its review progress in `batch.review.json`.
pub(crate) fn state_path(batch: &Path) -> PathBuf {
    batch.with_extension("review.json")
}

/// Resumes saved progress only while the batch file still matches it.
fn load_state(batch: &Path, state_file: &Path) -> Result<SavedReview> {
    let source = load_batch(batch)?;
    if state_file.exists() {
        let raw = fs::read_to_string(state_file)
            .with_context(|| format!("failed reading review state {}", state_file.display()))?;
        let saved: SavedReview = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing review state {}", state_file.display()))?;
        if saved.batch == source {
            return Ok(saved);
        }
        eprintln!(
            "{} changed since {} was saved; starting a fresh review",
            batch.display(),
            state_file.display()
        );
    }
    Ok(SavedReview {
        review: BatchReviewState::new(source.clone()),
        batch: source,
    })
}

fn save_state(saved: &SavedReview, state_file: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(saved).context("failed to serialize review state")?;
    fs::write(state_file, format!("{json}\n"))
        .with_context(|| format!("failed writing review state {}", state_file.display()))
}

pub(crate) fn run(batch: &Path, applier: &Applier) -> Result<()> {
    let state_file = state_path(batch);
    let mut saved = load_state(batch, &state_file)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    println!(
        "Reviewing {} edit operations from {}. Type help for commands.",
        saved.review.entries().len(),
        batch.display()
    );
    print_list(&saved.review);

    loop {
        line.clear();
        print!("review> ");
        io::stdout().flush().context("failed flushing stdout")?;

        let bytes = input
            .read_line(&mut line)
            .context("failed reading review input")?;
        if bytes == 0 {
            break;
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() {
            continue;
        }
        if trimmed.trim() == ".exit" {
            break;
        }

        match handle_line(&mut saved.review, applier, trimmed) {
            Ok(false) => {}
            Ok(true) => save_state(&saved, &state_file)?,
            Err(err) => {
                eprintln!("error: {err:#}");
                // apply-all may have applied a prefix before failing
                save_state(&saved, &state_file)?;
            }
        }
    }

    let summary = saved.review.summary();
    println!(
        "applied={} edited={} reviewed={} unreviewed={}",
        summary.applied, summary.edited, summary.reviewed, summary.unreviewed
    );
    Ok(())
}

/// Runs one command. Returns whether the state changed.
fn handle_line(state: &mut BatchReviewState, applier: &Applier, line: &str) -> Result<bool> {
    let (command, rest) = split_word(line.trim_start());
    match command {
        "help" => {
            println!("{HELP}");
            Ok(false)
        }
        "list" => {
            print_list(state);
            Ok(false)
        }
        "show" => {
            let id = parse_id(rest)?;
            let entry = state
                .get(id)
                .ok_or_else(|| anyhow!("operation {id} is not part of this batch"))?;
            println!(
                "{} {:?} {} {}",
                entry.id,
                entry.status,
                entry.operation.operation_kind,
                entry.operation.target_path.display()
            );
            println!("--- search\n{}", entry.operation.search);
            println!("--- replace\n{}", entry.operation.replace);
            Ok(false)
        }
        "search" | "replace" => {
            let (raw_id, text) = split_word(rest);
            let id = parse_id(raw_id)?;
            let text = unescape(text);
            let patch = if command == "search" {
                OperationPatch {
                    search: Some(text),
                    ..OperationPatch::default()
                }
            } else {
                OperationPatch {
                    replace: Some(text),
                    ..OperationPatch::default()
                }
            };
            state.edit(id, patch)?;
            println!("{id} edited");
            Ok(true)
        }
        "kind" => {
            let (raw_id, raw_kind) = split_word(rest);
            let id = parse_id(raw_id)?;
            let kind = OperationKind::parse(raw_kind.trim())
                .ok_or_else(|| anyhow!("unknown operation kind '{}'", raw_kind.trim()))?;
            state.edit(
                id,
                OperationPatch {
                    operation_kind: Some(kind),
                    ..OperationPatch::default()
                },
            )?;
            println!("{id} is now {kind}");
            Ok(true)
        }
        "ok" => {
            let id = parse_id(rest)?;
            state.mark_reviewed(id)?;
            println!("{id} reviewed");
            Ok(true)
        }
        "apply" => {
            let id = parse_id(rest)?;
            let outcome = state.apply(id, applier)?;
            println!("{id} {outcome}");
            Ok(true)
        }
        "apply-all" => {
            for (id, outcome) in state.apply_pending(applier)? {
                println!("{id} {outcome}");
            }
            println!("all operations applied");
            Ok(true)
        }
        other => bail!("unknown command '{other}' (type help)"),
    }
}

fn print_list(state: &BatchReviewState) {
    for entry in state.entries() {
        println!(
            "{} [{:?}] {} {}",
            entry.id,
            entry.status,
            entry.operation.operation_kind,
            entry.operation.target_path.display()
        );
    }
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (input, ""),
    }
}

fn parse_id(raw: &str) -> Result<OperationId> {
    let raw = raw.trim().trim_start_matches('#');
    raw.parse::<usize>()
        .map(OperationId)
        .map_err(|_| anyhow!("expected an operation number, got '{raw}'"))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
