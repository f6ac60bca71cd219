//! Authenticated JSON client shared by the Google collaborators.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use roster_core::config::RosterConfig;
use roster_sync::{CollaboratorError, SyncError};

const DIRECTORY_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";
const PEOPLE_BASE: &str = "https://people.googleapis.com/v1";
const DRIVE_ACTIVITY_BASE: &str = "https://driveactivity.googleapis.com/v2";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const TIMEOUT: Duration = Duration::from_secs(30);

/// API base URLs; overridable to point at a local stand-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub directory: String,
    pub people: String,
    pub drive_activity: String,
    pub drive: String,
    pub drive_upload: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            directory: DIRECTORY_BASE.to_string(),
            people: PEOPLE_BASE.to_string(),
            drive_activity: DRIVE_ACTIVITY_BASE.to_string(),
            drive: DRIVE_BASE.to_string(),
            drive_upload: DRIVE_UPLOAD_BASE.to_string(),
        }
    }
}

/// Bearer-token client. `quota_user` is passed through on every request so
/// quota is charged to the running identity.
#[derive(Clone)]
pub struct GoogleClient {
    agent: ureq::Agent,
    access_token: String,
    quota_user: Option<String>,
    pub(crate) endpoints: Endpoints,
}

impl GoogleClient {
    pub fn new(access_token: impl Into<String>, quota_user: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(TIMEOUT)
            .timeout_read(TIMEOUT)
            .timeout_write(TIMEOUT)
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            access_token: access_token.into(),
            quota_user,
            endpoints: Endpoints::default(),
        }
    }

    /// Client for `config`, reading the access token from the configured
    /// environment variable.
    pub fn from_config(config: &RosterConfig) -> Result<Self, SyncError> {
        let var = &config.google.access_token_env;
        let token = std::env::var(var)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SyncError::Config(format!("${var} holds no Google access token")))?;
        Ok(Self::new(token, config.identity.clone()))
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub(crate) fn get<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CollaboratorError> {
        let mut request = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }
        if let Some(user) = &self.quota_user {
            request = request.query("quotaUser", user);
        }
        tracing::debug!("GET {url}");
        let response = request.call().map_err(|e| from_ureq(service, e))?;
        response.into_json().map_err(|e| CollaboratorError::Malformed {
            service,
            message: e.to_string(),
        })
    }

    /// GET returning the raw response body.
    pub(crate) fn get_text(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, CollaboratorError> {
        let mut request = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", self.access_token));
        for (key, value) in query {
            request = request.query(key, value);
        }
        if let Some(user) = &self.quota_user {
            request = request.query("quotaUser", user);
        }
        tracing::debug!("GET {url}");
        let response = request.call().map_err(|e| from_ureq(service, e))?;
        response.into_string().map_err(|e| CollaboratorError::Malformed {
            service,
            message: e.to_string(),
        })
    }

    /// PATCH `body` as `content_type`; the response body is discarded.
    pub(crate) fn patch_text(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, String)],
        content_type: &str,
        body: &str,
    ) -> Result<(), CollaboratorError> {
        let mut request = self
            .agent
            .request("PATCH", url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .set("Content-Type", content_type);
        for (key, value) in query {
            request = request.query(key, value);
        }
        if let Some(user) = &self.quota_user {
            request = request.query("quotaUser", user);
        }
        tracing::debug!("PATCH {url}");
        request.send_string(body).map_err(|e| from_ureq(service, e))?;
        Ok(())
    }

    pub(crate) fn post<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, CollaboratorError> {
        let mut request = self
            .agent
            .post(url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .set("Accept", "application/json");
        if let Some(user) = &self.quota_user {
            request = request.query("quotaUser", user);
        }
        tracing::debug!("POST {url}");
        let response = request.send_json(body).map_err(|e| from_ureq(service, e))?;
        response.into_json().map_err(|e| CollaboratorError::Malformed {
            service,
            message: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn from_ureq(service: &'static str, err: ureq::Error) -> CollaboratorError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            classify(service, status, &body)
        }
        ureq::Error::Transport(transport) => CollaboratorError::Unavailable {
            service,
            message: transport.to_string(),
        },
    }
}

/// Map a non-success response to a [`CollaboratorError`].
///
/// The People API rejects an expired sync token with `400
/// FAILED_PRECONDITION` ("Sync token is expired"); quota exhaustion is `429`
/// or `403 RESOURCE_EXHAUSTED`.
pub fn classify(service: &'static str, status: u16, body: &str) -> CollaboratorError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let ErrorBody { message, status: code } = envelope.error;
    let message = if message.is_empty() { body.trim().to_string() } else { message };

    let expired = (status == 400 && code == "FAILED_PRECONDITION"
        && message.to_ascii_lowercase().contains("sync token"))
        || status == 410;
    if expired {
        return CollaboratorError::ExpiredSyncToken;
    }
    if status == 429 || code == "RESOURCE_EXHAUSTED" {
        return CollaboratorError::Quota { service, message };
    }
    CollaboratorError::Http { service, status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EXPIRED: &str = r#"{"error":{"code":400,"message":"Sync token is expired. Clear local cache and retry call without the sync token.","status":"FAILED_PRECONDITION"}}"#;

    #[test]
    fn expired_sync_token_is_recognised() {
        assert!(matches!(classify("people", 400, EXPIRED), CollaboratorError::ExpiredSyncToken));
    }

    #[rstest]
    #[case(429, r#"{"error":{"message":"slow down","status":"RESOURCE_EXHAUSTED"}}"#)]
    #[case(403, r#"{"error":{"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#)]
    fn quota_errors_are_fatal_kind(#[case] status: u16, #[case] body: &str) {
        assert!(matches!(classify("people", status, body), CollaboratorError::Quota { .. }));
    }

    #[test]
    fn other_precondition_failures_stay_http() {
        let body = r#"{"error":{"message":"Precondition check failed.","status":"FAILED_PRECONDITION"}}"#;
        match classify("people", 400, body) {
            CollaboratorError::Http { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Precondition check failed.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_kept_as_message() {
        match classify("directory", 502, "Bad Gateway\n") {
            CollaboratorError::Http { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_token_env_is_config_error() {
        let mut config = RosterConfig::default();
        config.google.access_token_env = "ROSTER_TEST_TOKEN_THAT_IS_NEVER_SET".into();
        assert!(matches!(GoogleClient::from_config(&config), Err(SyncError::Config(_))));
    }
}
