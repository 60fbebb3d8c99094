use super::{Cli, Commands, apply_command, edit_command, plan_command};
use super::{review_command, rewrite_command, run_command};
use anyhow::Result;

pub(crate) fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Plan {
            prompt,
            output,
            common,
            llm,
        } => plan_command(prompt, output, common, llm),
        Commands::Apply {
            batch,
            common,
            apply,
        } => apply_command(batch, common, apply),
        Commands::Run {
            prompt,
            dry_run,
            common,
            llm,
            apply,
        } => run_command(prompt, dry_run, common, llm, apply),
        Commands::Edit {
            file,
            edits,
            in_place,
            verbose,
        } => edit_command(file, edits, in_place, verbose),
        Commands::Rewrite {
            file,
            target,
            prompt,
            context,
            in_place,
            common,
            llm,
        } => rewrite_command(file, target, prompt, context, in_place, common, llm),
        Commands::Review {
            batch,
            common,
            apply,
        } => review_command(batch, common, apply),
    }
}
