//! `roster diff`: unified diff of what a regeneration would write.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use roster_core::config;
use roster_core::properties::FileProperties;
use roster_sync::{diff_document, pipeline, RosterSink};

use crate::sources::{open_sink, Sources};

/// Arguments for `roster diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load config.yaml")?;
        let sources = Sources::from_config(&config, &home).context("failed to open sources")?;
        let properties = FileProperties::load_at(&home).context("failed to load properties")?;
        let sink = open_sink(&config, &home, &properties).context("failed to open document")?;

        let aggregation =
            pipeline::build_document(&config, sources.directory(), sources.contacts(), &properties)
                .context("failed to build roster")?;
        for issue in &aggregation.issues {
            eprintln!("{} {issue}", "warning:".yellow().bold());
        }

        let rendered = sink.render(&aggregation.document).context("failed to render roster")?;
        let diff = diff_document(sink.as_ref(), &rendered).context("failed to diff document")?;
        if diff.is_empty() {
            println!("No differences for {}.", diff.document);
            return Ok(());
        }

        print!("{}", diff.unified_diff);
        if !diff.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
