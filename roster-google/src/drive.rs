//! Drive-hosted roster: Drive Activity API as an [`AlterationSignal`] and
//! the Drive file itself as a [`RosterSink`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use roster_core::types::RosterDocument;
use roster_renderer::{OutputFormat, Renderer};
use roster_sync::{
    content_digest, AlterationSignal, CollaboratorError, DocumentActivity, RosterSink, SyncError,
    WriteResult,
};

use crate::client::GoogleClient;

const SERVICE: &str = "drive activity";
const FILES_SERVICE: &str = "drive";

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    activities: Vec<Activity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    time_range: Option<TimeRange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeRange {
    #[serde(default)]
    end_time: Option<String>,
}

fn latest_activity(response: QueryResponse) -> Result<DocumentActivity, CollaboratorError> {
    let Some(activity) = response.activities.into_iter().next() else {
        return Ok(DocumentActivity::Unknown);
    };
    let raw = activity
        .timestamp
        .or_else(|| activity.time_range.and_then(|r| r.end_time));
    let Some(raw) = raw else {
        return Ok(DocumentActivity::Unknown);
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| DocumentActivity::LastModified(t.with_timezone(&Utc)))
        .map_err(|e| CollaboratorError::Malformed {
            service: SERVICE,
            message: format!("activity timestamp {raw:?}: {e}"),
        })
}

/// Most recent Drive activity on a document, by Drive file id.
#[derive(Clone)]
pub struct DriveActivity {
    client: GoogleClient,
}

impl DriveActivity {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

impl AlterationSignal for DriveActivity {
    fn last_activity(&self, document_id: &str) -> Result<DocumentActivity, CollaboratorError> {
        let url = format!("{}/activity:query", self.client.endpoints.drive_activity);
        let body = json!({ "pageSize": 1, "itemName": format!("items/{document_id}") });
        match self.client.post::<QueryResponse>(SERVICE, &url, body) {
            Ok(response) => latest_activity(response),
            Err(CollaboratorError::Http { status: 404, .. }) => Ok(DocumentActivity::Missing),
            Err(err) => Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// DriveDocument
// ---------------------------------------------------------------------------

fn content_type(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Markdown => "text/markdown; charset=utf-8",
        OutputFormat::Html     => "text/html; charset=utf-8",
        OutputFormat::Text     => "text/plain; charset=utf-8",
    }
}

/// Roster published to an existing Drive file, addressed by file id.
///
/// Reads use `alt=media` downloads and writes replace the file content with
/// a media upload, so the Drive activity feed sees every publish. Publishing
/// is hash-gated like the local file writer.
pub struct DriveDocument {
    client: GoogleClient,
    file_id: String,
    format: OutputFormat,
    renderer: Renderer,
}

impl DriveDocument {
    pub fn new(
        client: GoogleClient,
        file_id: impl Into<String>,
        format: OutputFormat,
        renderer: Renderer,
    ) -> Self {
        Self { client, file_id: file_id.into(), format, renderer }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn not_found(&self) -> SyncError {
        SyncError::Config(format!("Drive file {} does not exist or is not shared", self.file_id))
    }
}

impl RosterSink for DriveDocument {
    fn document_id(&self) -> String {
        self.file_id.clone()
    }

    fn render(&self, doc: &RosterDocument) -> Result<String, SyncError> {
        Ok(self.renderer.render(doc, self.format)?)
    }

    fn current(&self) -> Result<Option<String>, SyncError> {
        let url = format!("{}/files/{}", self.client.endpoints.drive, self.file_id);
        let query = [("alt", "media".to_string())];
        match self.client.get_text(FILES_SERVICE, &url, &query) {
            Ok(content) => Ok(Some(content.replace("\r\n", "\n"))),
            Err(CollaboratorError::Http { status: 404, .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn publish(&mut self, rendered: &str) -> Result<WriteResult, SyncError> {
        let content = rendered.replace("\r\n", "\n");
        let digest = content_digest(&content);
        let document = self.document_id();

        if let Some(existing) = self.current()? {
            if content_digest(&existing) == digest {
                tracing::debug!("unchanged: drive file {}", self.file_id);
                return Ok(WriteResult::Unchanged { document, digest });
            }
        }

        let url = format!("{}/files/{}", self.client.endpoints.drive_upload, self.file_id);
        let query = [("uploadType", "media".to_string())];
        match self
            .client
            .patch_text(FILES_SERVICE, &url, &query, content_type(self.format), &content)
        {
            Ok(()) => {}
            Err(CollaboratorError::Http { status: 404, .. }) => return Err(self.not_found()),
            Err(err) => return Err(err.into()),
        }

        tracing::info!("wrote: drive file {}", self.file_id);
        Ok(WriteResult::Written { document, digest })
    }
}
