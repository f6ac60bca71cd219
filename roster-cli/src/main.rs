//! Roster: band roster document kept in sync with the directory and contacts.
//!
//! # Usage
//!
//! ```text
//! roster init [--identity <email>] [--snapshot <path>] [--document <path>] [--force]
//! roster run [--force] [--dry-run]
//! roster status [--json]
//! roster diff
//! roster schedule start|install|uninstall|logs
//! ```

mod commands;
mod sources;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, init::InitArgs, run::RunArgs, schedule::ScheduleCommand, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "roster",
    version,
    about = "Regenerate the band roster document when contacts or the document change",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter ~/.roster/config.yaml.
    Init(InitArgs),

    /// Check staleness and regenerate the roster document if needed.
    Run(RunArgs),

    /// Show persisted sync state and whether the document was edited.
    Status(StatusArgs),

    /// Show a unified diff of what a regeneration would write.
    Diff(DiffArgs),

    /// Run on an interval, or manage the launchd agent.
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Run(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Schedule { command } => commands::schedule::run(command),
    }
}
