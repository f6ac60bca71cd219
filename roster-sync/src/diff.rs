//! Unified diff of the would-be roster against the current document, for
//! `roster diff`.

use similar::TextDiff;

use crate::collaborators::RosterSink;
use crate::SyncError;

/// Diff between the current and the freshly rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDiff {
    pub document: String,
    /// Empty when the document is already up to date.
    pub unified_diff: String,
}

impl DocumentDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Compare `rendered` to what `sink` currently holds. Nothing is written.
pub fn diff_document(sink: &dyn RosterSink, rendered: &str) -> Result<DocumentDiff, SyncError> {
    let document = sink.document_id();
    let existing = sink.current()?.unwrap_or_default();
    let rendered = rendered.replace("\r\n", "\n");
    if existing == rendered {
        return Ok(DocumentDiff { document, unified_diff: String::new() });
    }

    let old_header = format!("a/{document}");
    let new_header = format!("b/{document}");
    let unified_diff = TextDiff::from_lines(&existing, &rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Ok(DocumentDiff { document, unified_diff })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::writer::FileDocument;

    #[test]
    fn missing_document_diffs_as_all_additions() {
        let dir = TempDir::new().unwrap();
        let doc = FileDocument::open(dir.path().join("roster.md"), None).unwrap();
        let diff = diff_document(&doc, "Officers\n").unwrap();
        assert!(diff.unified_diff.contains("+Officers"));
        assert!(!diff.is_empty());
    }

    #[test]
    fn identical_document_has_empty_diff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.md");
        std::fs::write(&path, "Officers\r\n").unwrap();
        let doc = FileDocument::open(&path, None).unwrap();
        assert!(diff_document(&doc, "Officers\n").unwrap().is_empty());
    }

    #[test]
    fn changed_line_is_shown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.md");
        std::fs::write(&path, "- Ann Smith\n- Bob Adams\n").unwrap();
        let doc = FileDocument::open(&path, None).unwrap();
        let diff = diff_document(&doc, "- Ann Smith\n- Rob Adams\n").unwrap();
        assert!(diff.unified_diff.contains("\n-- Bob Adams\n"));
        assert!(diff.unified_diff.contains("\n+- Rob Adams\n"));
        assert!(diff.unified_diff.contains("\n - Ann Smith\n"));
        assert!(diff.unified_diff.starts_with("--- a/"));
    }
}
