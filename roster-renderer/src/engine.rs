//! Tera rendering engine: [`OutputFormat`] and [`Renderer`].
//!
//! | Format   | Extensions        | Template      |
//! |----------|-------------------|---------------|
//! | Markdown | `.md`, `.markdown`| `roster.md`   |
//! | Html     | `.html`, `.htm`   | `roster.html` |
//! | Text     | anything else     | `roster.txt`  |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::{Tera, Value};

use roster_core::types::RosterDocument;

use crate::context::RosterContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("roster.md", include_str!("templates/roster.md.tera")),
    ("roster.html", include_str!("templates/roster.html.tera")),
    ("roster.txt", include_str!("templates/roster.txt.tera")),
];

const TEMPLATE_EXT: &str = ".tera";

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Override { path: path.into(), source }
}

/// `html/Roster.HTML.tera` → `html/roster.html`. Keeping the real extension
/// lets tera's autoescaping kick in for HTML.
fn normalize_template_name(path: &Path) -> String {
    let name = path.to_string_lossy().replace('\\', "/").to_lowercase();
    name.strip_suffix(TEMPLATE_EXT)
        .map(str::to_string)
        .unwrap_or(name)
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

// ---------------------------------------------------------------------------
// Markdown escaping
// ---------------------------------------------------------------------------

/// Characters with inline meaning anywhere in a Markdown line.
const MD_INLINE: &[char] = &['\\', '`', '*', '_', '[', ']', '<', '>', '|', '~'];

/// Characters that start a block construct at the beginning of a list item.
const MD_LEADING: &[char] = &['#', '+', '-', '='];

/// Backslash-escape `text` so names render literally inside a Markdown
/// bullet. Leading block markers and `1.`/`1)` ordered-list prefixes are
/// escaped as well.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    for (i, c) in text.chars().enumerate() {
        let leading = i == 0 && MD_LEADING.contains(&c);
        let ordered = digits > 0 && i == digits && (c == '.' || c == ')');
        if leading || ordered || MD_INLINE.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn md_escape_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("md_escape expects a string"))?;
    Ok(Value::String(escape_markdown(text)))
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert((*name).to_string(), (*content).to_string());
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.register_filter("md_escape", md_escape_filter);
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Document flavours the renderer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Markdown,
    Html,
    Text,
}

impl OutputFormat {
    pub fn all() -> &'static [OutputFormat] {
        &[OutputFormat::Markdown, OutputFormat::Html, OutputFormat::Text]
    }

    /// Pick a format from a document path's extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("md") | Some("markdown") => OutputFormat::Markdown,
            Some("html") | Some("htm") => OutputFormat::Html,
            _ => OutputFormat::Text,
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "roster.md",
            OutputFormat::Html     => "roster.html",
            OutputFormat::Text     => "roster.txt",
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tera-based roster renderer.
///
/// `user_template_dir` may contain `roster.md.tera`, `roster.html.tera` or
/// `roster.txt.tera` overriding the embedded defaults.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Renderer with embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_templates(None)
    }

    pub fn with_templates(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera(user_template_dir)? })
    }

    /// Render `doc` in `format`.
    ///
    /// Output uses LF line endings and ends with exactly one newline, so the
    /// same document always renders to the same bytes.
    pub fn render(&self, doc: &RosterDocument, format: OutputFormat) -> Result<String, RenderError> {
        let ctx = RosterContext::from_document(doc);
        self.render_with_context(&ctx, format)
    }

    pub fn render_with_context(
        &self,
        ctx: &RosterContext,
        format: OutputFormat,
    ) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let raw = self.tera.render(format.template_name(), &tera_ctx)?;
        let mut out = raw.replace("\r\n", "\n").trim_end().to_string();
        out.push('\n');
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
