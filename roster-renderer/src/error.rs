//! Rendering failures.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A roster template failed to parse or render.
    #[error("roster template error: {0}")]
    Template(#[from] tera::Error),

    /// A `*.tera` override under the template directory could not be read.
    #[error("cannot read template override {path}: {source}")]
    Override {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
