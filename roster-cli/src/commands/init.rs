//! `roster init [--identity <email>] [--snapshot <path>] [--document <path>]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use roster_core::config::{self, RosterConfig, SourceKind};
use roster_core::paths::{config_path_at, ensure_root_at};

/// Write a starter `~/.roster/config.yaml`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Identity the roster runs as; resolves the directory customer.
    #[arg(long)]
    pub identity: Option<String>,

    /// Read directory and contacts from a JSON snapshot instead of Google.
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Render target. The extension picks the format (.md, .html, .txt).
    #[arg(long, value_name = "PATH")]
    pub document: Option<PathBuf>,

    /// Overwrite an existing config.yaml.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let path = config_path_at(&home);
        if path.exists() && !self.force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }

        let mut config = RosterConfig {
            identity: self.identity,
            ..RosterConfig::default()
        };
        match self.snapshot {
            Some(snapshot) => {
                let snapshot = snapshot
                    .canonicalize()
                    .with_context(|| format!("cannot resolve snapshot '{}'", snapshot.display()))?;
                config.source = SourceKind::Snapshot;
                config.snapshot_path = Some(snapshot);
            }
            None => config.source = SourceKind::Google,
        }
        if let Some(document) = self.document {
            config.document.path = document;
        }

        ensure_root_at(&home).context("failed to create ~/.roster")?;
        config::save_at(&home, &config).context("failed to save config.yaml")?;

        println!("✓ Wrote {}", path.display());
        println!("  document: {}", config.document_path_at(&home).display());
        if config.identity.is_none() {
            println!("  set `identity` before the first run");
        }
        Ok(())
    }
}
