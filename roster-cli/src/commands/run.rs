//! `roster run [--force] [--dry-run]`: one pass of the staleness oracle and,
//! when needed, a regeneration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use roster_daemon::{execute_once, init_tracing, log_rotation};
use roster_sync::{RunOptions, RunOutcome, WriteResult};

use crate::sources::run_once;

/// Arguments for `roster run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Regenerate even when nothing changed.
    #[arg(long)]
    pub force: bool,

    /// Evaluate and render without writing the document or any state.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        init_tracing();
        log_rotation::rotate_logs(&home);

        let mut options = if self.force { RunOptions::force() } else { RunOptions::scheduled() };
        if self.dry_run {
            options = options.dry_run();
        }

        let job_home = home.clone();
        let job = move || run_once(&job_home, options);
        let outcome = execute_once(&home, &job).context("roster run failed")?;
        print_outcome(&outcome);
        Ok(())
    }
}

fn print_outcome(outcome: &RunOutcome) {
    let prefix = if outcome.dry_run { "[dry-run] " } else { "" };
    let Some(write) = outcome.write.as_ref() else {
        println!("{prefix}✓ roster up to date");
        return;
    };

    let reasons: Vec<String> = outcome.decision.reasons.iter().map(ToString::to_string).collect();
    println!("{prefix}✓ roster regenerated ({})", reasons.join(", "));
    match write {
        WriteResult::Written { document, .. } => println!("  ✎  {document}"),
        WriteResult::WouldWrite { document, .. } => println!("  ~  {document}"),
        WriteResult::Unchanged { document, .. } => println!("  ·  {document} (unchanged)"),
    }
    for issue in &outcome.issues {
        println!("  {} {issue}", "!".yellow().bold());
    }
}
