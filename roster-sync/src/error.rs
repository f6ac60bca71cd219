//! Error types for roster-sync.

use std::path::PathBuf;

use thiserror::Error;

use roster_core::CoreError;
use roster_renderer::RenderError;

/// Failures reported by an external collaborator (directory, contacts,
/// activity signal).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The contacts provider rejected the sync token as expired. The only
    /// failure the staleness oracle recovers from.
    #[error("sync token is expired")]
    ExpiredSyncToken,

    /// The identity could not be mapped to a directory customer.
    #[error("no customer id for {identity}")]
    NoCustomerId { identity: String },

    /// Request quota exhausted. Fatal for the run.
    #[error("{service} quota exceeded: {message}")]
    Quota {
        service: &'static str,
        message: String,
    },

    /// Transport-level failure or non-success response.
    #[error("{service} request failed (HTTP {status}): {message}")]
    Http {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The collaborator could not be reached at all.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// The response could not be understood.
    #[error("{service} returned malformed data: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that can abort a roster run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required identifier or collaborator is not configured.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file could not be parsed.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// True when the run was aborted because the sync token expired twice.
    pub fn is_expired_token(&self) -> bool {
        matches!(self, SyncError::Collaborator(CollaboratorError::ExpiredSyncToken))
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
