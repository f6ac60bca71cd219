//! `~/.roster/config.yaml`: collaborator selection and policy values.
//!
//! Every section has defaults, so a missing file (or a file that only sets
//! a few keys) still yields a complete [`RosterConfig`].
//!
//! ```yaml
//! identity: admin@example.org
//! source: snapshot
//! snapshot_path: /srv/roster/snapshot.json
//! document:
//!   path: roster.md
//!   activity: file
//! officers:
//!   org_unit: /Officers
//!   roles:
//!     treasurer: jdoe
//! policy:
//!   skew_allowance_secs: 60
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::paths::{config_path_at, roster_root, write_atomic, DEFAULT_DOCUMENT};
use crate::types::{GroupKind, LocalId, OfficerRole};

/// Where directory and contacts data come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON snapshot file (offline runs and fixtures).
    #[default]
    Snapshot,
    /// Google Admin Directory, People and Drive Activity APIs.
    Google,
}

/// Where the external-alteration timestamp comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySource {
    /// Modification time of the rendered document file.
    #[default]
    File,
    /// Drive Activity for the `DOCUMENT_ID` property.
    Drive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Environment variable holding an OAuth access token.
    pub access_token_env: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            access_token_env: "ROSTER_GOOGLE_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Render target. Relative paths are resolved against `~/.roster/`.
    pub path: PathBuf,
    pub activity: ActivitySource,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DOCUMENT),
            activity: ActivitySource::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficerConfig {
    /// Organizational unit officers must belong to.
    pub org_unit: Option<String>,
    /// Mailbox local part bound to each role.
    pub roles: BTreeMap<OfficerRole, LocalId>,
}

impl Default for OfficerConfig {
    fn default() -> Self {
        Self {
            org_unit: Some("/Officers".to_string()),
            roles: OfficerRole::all()
                .iter()
                .map(|role| (*role, LocalId::from(role.key())))
                .collect(),
        }
    }
}

impl OfficerConfig {
    /// Local part bound to `role`, falling back to the role key.
    pub fn binding(&self, role: OfficerRole) -> LocalId {
        self.roles
            .get(&role)
            .cloned()
            .unwrap_or_else(|| LocalId::from(role.key()))
    }
}

/// Contact group names used when no resource name property is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupNames {
    pub active: String,
    pub piper: String,
    pub drummer: String,
}

impl Default for GroupNames {
    fn default() -> Self {
        Self {
            active: GroupKind::Active.default_name().to_string(),
            piper: GroupKind::Piper.default_name().to_string(),
            drummer: GroupKind::Drummer.default_name().to_string(),
        }
    }
}

impl GroupNames {
    pub fn name(&self, kind: GroupKind) -> &str {
        match kind {
            GroupKind::Active => &self.active,
            GroupKind::Piper => &self.piper,
            GroupKind::Drummer => &self.drummer,
        }
    }
}

/// Policy knobs for the staleness oracle and officer eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Lag tolerated between our own write and the alteration signal.
    pub skew_allowance_secs: i64,
    /// Drop suspended directory users from officer candidates.
    pub exclude_suspended: bool,
    /// Restrict officers to `officers.org_unit` when org units are reported.
    pub restrict_to_org_unit: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            skew_allowance_secs: 60,
            exclude_suspended: true,
            restrict_to_org_unit: true,
        }
    }
}

/// Upper bound for `policy.skew_allowance_secs` (one week).
pub const MAX_SKEW_ALLOWANCE_SECS: i64 = 7 * 24 * 60 * 60;

impl PolicyConfig {
    /// Skew allowance clamped to `0..=MAX_SKEW_ALLOWANCE_SECS`.
    pub fn skew_allowance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.skew_allowance_secs.clamp(0, MAX_SKEW_ALLOWANCE_SECS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 15 * 60 }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Identity the run acts as; used to resolve the directory customer and
    /// passed through as the quota user.
    pub identity: Option<String>,
    pub source: SourceKind,
    pub snapshot_path: Option<PathBuf>,
    pub google: GoogleConfig,
    pub document: DocumentConfig,
    pub officers: OfficerConfig,
    pub groups: GroupNames,
    pub policy: PolicyConfig,
    pub schedule: ScheduleConfig,
}

impl RosterConfig {
    /// Absolute render target path.
    pub fn document_path_at(&self, home: &Path) -> PathBuf {
        resolve_at(home, &self.document.path)
    }

    /// Absolute snapshot path, if one is configured.
    pub fn snapshot_path_at(&self, home: &Path) -> Option<PathBuf> {
        self.snapshot_path.as_ref().map(|p| resolve_at(home, p))
    }
}

fn resolve_at(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        roster_root(home).join(path)
    }
}

/// Load `<home>/.roster/config.yaml`, or defaults if the file is absent.
pub fn load_at(home: &Path) -> Result<RosterConfig, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(RosterConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(RosterConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// Atomically save `config` to `<home>/.roster/config.yaml`.
pub fn save_at(home: &Path, config: &RosterConfig) -> Result<(), CoreError> {
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(&config_path_at(home), &yaml)
}
