//! # roster-renderer
//!
//! Tera-based rendering of a [`RosterDocument`](roster_core::types::RosterDocument)
//! into Markdown, HTML or plain text, plus the structured
//! [`DocumentEntry`] layout (styled headers, bullets, blank rows).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roster_core::types::RosterDocument;
//! use roster_renderer::{OutputFormat, Renderer};
//!
//! fn render(doc: &RosterDocument) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(text) = renderer.render(doc, OutputFormat::Markdown) {
//!             println!("{text}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{DocumentEntry, HeaderStyle, RosterContext};
pub use engine::{OutputFormat, Renderer};
pub use error::RenderError;
