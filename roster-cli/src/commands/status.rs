//! `roster status`: persisted sync state and document drift.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use roster_core::config;
use roster_core::properties::{FileProperties, PropertyKey, PropertyStore};
use roster_daemon::{read_last_run, RunSummary};
use roster_renderer::OutputFormat;
use roster_sync::{content_digest, staleness::format_datetime_age, RosterSink};

use crate::sources::open_sink;

/// Arguments for `roster status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let report = build_report(&home)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

/// Whether the document on disk is the one the last regeneration wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum DocumentState {
    Current,
    Modified,
    Missing,
    Untracked,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    document: String,
    format: &'static str,
    document_state: DocumentState,
    sync_token: Option<String>,
    last_updated: Option<DateTime<Utc>>,
    last_updated_age: String,
    last_run: Option<RunSummary>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "field")]
    field: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn build_report(home: &Path) -> Result<StatusReport> {
    let config = config::load_at(home).context("failed to load config.yaml")?;
    let properties = FileProperties::load_at(home).context("failed to load properties")?;
    let state = properties.sync_state().context("invalid persisted sync state")?;

    let sink = open_sink(&config, home, &properties).context("failed to open document")?;
    let document_state =
        document_state(sink.as_ref(), properties.get(PropertyKey::DocumentDigest))?;
    let last_updated_age = state
        .last_updated
        .map(format_datetime_age)
        .unwrap_or_else(|| "never".to_string());
    let last_run = read_last_run(home).context("failed to read last run")?;

    Ok(StatusReport {
        format: format_name(OutputFormat::from_path(&config.document.path)),
        document: sink.document_id(),
        document_state,
        sync_token: state.last_sync_token.map(|t| t.0),
        last_updated: state.last_updated,
        last_updated_age,
        last_run,
    })
}

fn document_state(sink: &dyn RosterSink, recorded: Option<String>) -> Result<DocumentState> {
    let current = sink
        .current()
        .with_context(|| format!("failed to read {}", sink.document_id()))?;
    let Some(content) = current else {
        return Ok(DocumentState::Missing);
    };
    Ok(match recorded {
        None => DocumentState::Untracked,
        Some(digest) if digest == content_digest(&content) => DocumentState::Current,
        Some(_) => DocumentState::Modified,
    })
}

fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Markdown => "markdown",
        OutputFormat::Html => "html",
        OutputFormat::Text => "text",
    }
}

fn print_table(report: &StatusReport) {
    println!(
        "Roster v{} | {} {}",
        env!("CARGO_PKG_VERSION"),
        state_indicator(report.document_state),
        state_label(report.document_state),
    );

    let last_run = match &report.last_run {
        None => "none recorded".to_string(),
        Some(run) if run.ok => format!(
            "ok ({}, {} issue(s))",
            run.write.as_deref().unwrap_or("no write"),
            run.issues
        ),
        Some(run) => format!("failed: {}", run.error.as_deref().unwrap_or("unknown error")),
    };
    let rows = vec![
        StatusRow { field: "document", value: report.document.clone() },
        StatusRow { field: "format", value: report.format.to_string() },
        StatusRow {
            field: "sync token",
            value: report.sync_token.clone().unwrap_or_else(|| "none".to_string()),
        },
        StatusRow { field: "last updated", value: report.last_updated_age.clone() },
        StatusRow { field: "last run", value: last_run },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if matches!(report.document_state, DocumentState::Modified | DocumentState::Missing) {
        println!("The next scheduled run will regenerate it; 'roster run --force' does it now.");
    }
}

fn state_label(state: DocumentState) -> &'static str {
    match state {
        DocumentState::Current => "CURRENT",
        DocumentState::Modified => "MODIFIED",
        DocumentState::Missing => "MISSING",
        DocumentState::Untracked => "UNTRACKED",
    }
}

fn state_indicator(state: DocumentState) -> String {
    match state {
        DocumentState::Current => "■".green().bold().to_string(),
        DocumentState::Modified => "■".red().bold().to_string(),
        DocumentState::Missing => "■".magenta().bold().to_string(),
        DocumentState::Untracked => "■".bright_black().bold().to_string(),
    }
}
