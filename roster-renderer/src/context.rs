//! Rendering payload built from a [`RosterDocument`].
//!
//! The same payload drives both the tera templates and the structured
//! [`DocumentEntry`] layout handed to document surfaces that apply styles
//! themselves.

use serde::{Deserialize, Serialize};

use roster_core::types::{RosterDocument, RosterMember};

use crate::error::RenderError;

pub const OFFICERS_TITLE: &str = "Officers";
pub const PIPERS_TITLE: &str = "Pipers";
pub const DRUMMERS_TITLE: &str = "Drummers";

/// Styling applied to section headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderStyle {
    pub bold: bool,
    pub font_size: u8,
}

impl Default for HeaderStyle {
    fn default() -> Self {
        Self { bold: true, font_size: 12 }
    }
}

/// One titled bullet list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCtx {
    pub title: String,
    pub style: HeaderStyle,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaCtx {
    pub title: String,
    pub roster_version: String,
}

/// Template context: sections in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterContext {
    pub sections: Vec<SectionCtx>,
    pub meta: MetaCtx,
}

/// Structured line of a rendered roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEntry {
    Header { text: String, style: HeaderStyle },
    Bullet(String),
    Blank,
}

impl RosterContext {
    /// Officers (`Title: Name`, vacancies included), then Pipers, then Drummers.
    pub fn from_document(doc: &RosterDocument) -> Self {
        let officers = doc
            .officers
            .iter()
            .map(|(role, holder)| format!("{}: {}", role.title(), holder))
            .collect();

        RosterContext {
            sections: vec![
                section(OFFICERS_TITLE, officers),
                section(PIPERS_TITLE, names(&doc.pipers)),
                section(DRUMMERS_TITLE, names(&doc.drummers)),
            ],
            meta: MetaCtx {
                title: "Roster".to_string(),
                roster_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Flatten into header / bullet / blank entries.
    ///
    /// Each section is a styled header, its bullets, and one blank row.
    pub fn entries(&self) -> Vec<DocumentEntry> {
        let mut out = Vec::new();
        for section in &self.sections {
            out.push(DocumentEntry::Header {
                text: section.title.clone(),
                style: section.style,
            });
            out.extend(section.items.iter().cloned().map(DocumentEntry::Bullet));
            out.push(DocumentEntry::Blank);
        }
        out
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

fn section(title: &str, items: Vec<String>) -> SectionCtx {
    SectionCtx {
        title: title.to_string(),
        style: HeaderStyle::default(),
        items,
    }
}

fn names(members: &[RosterMember]) -> Vec<String> {
    members.iter().map(|m| m.display_name.clone()).collect()
}
