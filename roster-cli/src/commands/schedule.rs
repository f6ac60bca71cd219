//! `roster schedule`: interval runs in the foreground and launchd management.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use roster_core::config;
use roster_daemon::paths::{stderr_log_path, stdout_log_path};
use roster_daemon::{install_launchd, start_blocking, uninstall_launchd, Job};
use roster_sync::RunOptions;

use crate::sources::run_once;

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// Run scheduled passes in the foreground until Ctrl-C.
    Start(IntervalArgs),
    /// Install and bootstrap the launchd agent.
    Install(IntervalArgs),
    /// Boot out and remove the launchd agent.
    Uninstall,
    /// Print recent scheduler log lines.
    Logs(LogsArgs),
}

#[derive(Args, Debug)]
pub struct IntervalArgs {
    /// Seconds between runs (defaults to `schedule.interval_secs`).
    #[arg(long)]
    pub interval_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Show only the stderr log file.
    #[arg(long)]
    pub stderr_only: bool,
}

pub fn run(command: ScheduleCommand) -> Result<()> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

    match command {
        ScheduleCommand::Start(args) => {
            let interval = interval_secs(&home, &args)?;
            let job_home = home.clone();
            let job: Arc<Job> = Arc::new(move || run_once(&job_home, RunOptions::scheduled()));
            start_blocking(&home, Duration::from_secs(interval.max(1)), job)
                .context("scheduler exited with error")?;
        }
        ScheduleCommand::Install(args) => {
            let interval = interval_secs(&home, &args)?;
            let binary = std::env::current_exe().context("could not locate the roster binary")?;
            let path = install_launchd(&home, &binary, interval)
                .context("failed to install launchd agent")?;
            println!("installed launchd agent: {}", path.display());
        }
        ScheduleCommand::Uninstall => {
            uninstall_launchd(&home).context("failed to uninstall launchd agent")?;
            println!("uninstalled launchd agent");
        }
        ScheduleCommand::Logs(args) => {
            if !args.stderr_only {
                print_tail(&stdout_log_path(&home), args.lines)
                    .context("failed to read scheduler stdout log")?;
            }
            print_tail(&stderr_log_path(&home), args.lines)
                .context("failed to read scheduler stderr log")?;
        }
    }

    Ok(())
}

fn interval_secs(home: &std::path::Path, args: &IntervalArgs) -> Result<u64> {
    match args.interval_secs {
        Some(secs) => Ok(secs),
        None => Ok(config::load_at(home)
            .context("failed to load config.yaml")?
            .schedule
            .interval_secs),
    }
}

fn print_tail(path: &std::path::Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
