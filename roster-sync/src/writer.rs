//! Local document file: hash-gated atomic writer and mtime alteration signal.
//!
//! ## `publish` protocol
//!
//! 1. Render content (already done by caller).
//! 2. SHA-256 hash the rendered content.
//! 3. Hash the current file content, if any.
//! 4. Compare → skip if identical.
//! 5. Write to `<path>.roster.tmp`.
//! 6. Rename to final path (atomic on POSIX).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use roster_core::types::RosterDocument;
use roster_renderer::{OutputFormat, Renderer};

use crate::collaborators::{AlterationSignal, DocumentActivity, RosterSink, WriteResult};
use crate::error::{io_err, CollaboratorError, SyncError};

/// Hex SHA-256 of `content` after LF normalisation.
pub fn content_digest(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut h = Sha256::new();
    h.update(normalized.as_bytes());
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// FileDocument
// ---------------------------------------------------------------------------

/// Roster rendered to a file on disk; format follows the file extension.
pub struct FileDocument {
    path: PathBuf,
    format: OutputFormat,
    renderer: Renderer,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>, renderer: Renderer) -> Self {
        let path = path.into();
        let format = OutputFormat::from_path(&path);
        Self { path, format, renderer }
    }

    /// Use embedded templates, with overrides from `template_dir` if given.
    pub fn open(path: impl Into<PathBuf>, template_dir: Option<&Path>) -> Result<Self, SyncError> {
        Ok(Self::new(path, Renderer::with_templates(template_dir)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn tmp_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.roster.tmp", self.path.display()))
    }
}

impl RosterSink for FileDocument {
    fn document_id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn render(&self, doc: &RosterDocument) -> Result<String, SyncError> {
        Ok(self.renderer.render(doc, self.format)?)
    }

    fn current(&self) -> Result<Option<String>, SyncError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content.replace("\r\n", "\n"))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&self.path, err)),
        }
    }

    fn publish(&mut self, rendered: &str) -> Result<WriteResult, SyncError> {
        let content = rendered.replace("\r\n", "\n");
        let digest = content_digest(&content);
        let document = self.document_id();

        if let Some(existing) = self.current()? {
            if content_digest(&existing) == digest {
                tracing::debug!("unchanged: {}", self.path.display());
                return Ok(WriteResult::Unchanged { document, digest });
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = self.tmp_path();
        std::fs::write(&tmp, &content).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }

        tracing::info!("wrote: {}", self.path.display());
        Ok(WriteResult::Written { document, digest })
    }
}

// ---------------------------------------------------------------------------
// FileActivity
// ---------------------------------------------------------------------------

/// Alteration signal from file modification times; the document id is the
/// file path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileActivity;

impl AlterationSignal for FileActivity {
    fn last_activity(&self, document_id: &str) -> Result<DocumentActivity, CollaboratorError> {
        let path = Path::new(document_id);
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(DocumentActivity::Missing),
            Err(err) => {
                return Err(CollaboratorError::Io { path: path.to_path_buf(), source: err })
            }
        };
        match meta.modified() {
            Ok(modified) => Ok(DocumentActivity::LastModified(DateTime::<Utc>::from(modified))),
            Err(_) => Ok(DocumentActivity::Unknown),
        }
    }
}
