//! Key-value property store carried between runs.
//!
//! Properties are a flat string map persisted at
//! `<home>/.roster/properties.yaml`. [`FileProperties`] writes through on
//! every `set` using the atomic temp-file + rename save; [`MemoryProperties`]
//! backs dry runs and tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{io_err, CoreError};
use crate::paths::{properties_path_at, write_atomic};
use crate::types::{GroupKind, ResourceName, SyncState, SyncToken};

/// Keys the roster reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    DocumentId,
    ResourceNameActive,
    ResourceNamePiper,
    ResourceNameDrummer,
    ConnectionsSyncToken,
    LastUpdated,
    DocumentDigest,
}

impl PropertyKey {
    pub fn all() -> &'static [PropertyKey] {
        &[
            PropertyKey::DocumentId,
            PropertyKey::ResourceNameActive,
            PropertyKey::ResourceNamePiper,
            PropertyKey::ResourceNameDrummer,
            PropertyKey::ConnectionsSyncToken,
            PropertyKey::LastUpdated,
            PropertyKey::DocumentDigest,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKey::DocumentId           => "DOCUMENT_ID",
            PropertyKey::ResourceNameActive   => "RESOURCE_NAME_ACTIVE",
            PropertyKey::ResourceNamePiper    => "RESOURCE_NAME_PIPER",
            PropertyKey::ResourceNameDrummer  => "RESOURCE_NAME_DRUMMER",
            PropertyKey::ConnectionsSyncToken => "CONNECTIONS_SYNC_TOKEN",
            PropertyKey::LastUpdated          => "LAST_UPDATED",
            PropertyKey::DocumentDigest       => "DOCUMENT_DIGEST",
        }
    }

    /// Property holding the resource name of a contact group.
    pub fn for_group(kind: GroupKind) -> PropertyKey {
        match kind {
            GroupKind::Active => PropertyKey::ResourceNameActive,
            GroupKind::Piper => PropertyKey::ResourceNamePiper,
            GroupKind::Drummer => PropertyKey::ResourceNameDrummer,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence collaborator: `get(key) → string|empty`, `set(key, value)`.
///
/// Empty strings read back as `None`.
pub trait PropertyStore {
    fn get(&self, key: PropertyKey) -> Option<String>;

    fn set(&mut self, key: PropertyKey, value: String) -> Result<(), CoreError>;

    /// Store several values together. Persistent stores save them in one
    /// write so a failure leaves none of them applied.
    fn set_many(&mut self, entries: Vec<(PropertyKey, String)>) -> Result<(), CoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Token and last-update timestamp as a typed [`SyncState`].
    fn sync_state(&self) -> Result<SyncState, CoreError> {
        let last_updated = match self.get(PropertyKey::LastUpdated) {
            None => None,
            Some(raw) => Some(parse_timestamp(PropertyKey::LastUpdated, &raw)?),
        };
        Ok(SyncState {
            last_sync_token: self.get(PropertyKey::ConnectionsSyncToken).map(SyncToken::from),
            last_updated,
        })
    }

    fn set_sync_token(&mut self, token: &SyncToken) -> Result<(), CoreError> {
        self.set(PropertyKey::ConnectionsSyncToken, token.0.clone())
    }

    fn set_last_updated(&mut self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.set(PropertyKey::LastUpdated, timestamp_value(at))
    }

    /// Configured resource name of a contact group, if any.
    fn group_resource(&self, kind: GroupKind) -> Option<ResourceName> {
        self.get(PropertyKey::for_group(kind)).map(ResourceName::from)
    }
}

/// Stored form of a timestamp property: RFC 3339, UTC, millisecond precision.
pub fn timestamp_value(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(key: PropertyKey, raw: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidProperty {
            key: key.as_str(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store used for dry runs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProperties {
    values: BTreeMap<String, String>,
}

impl MemoryProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: PropertyKey, value: impl Into<String>) -> Self {
        self.values.insert(key.as_str().to_string(), value.into());
        self
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

impl From<BTreeMap<String, String>> for MemoryProperties {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

impl PropertyStore for MemoryProperties {
    fn get(&self, key: PropertyKey) -> Option<String> {
        non_empty(self.values.get(key.as_str()))
    }

    fn set(&mut self, key: PropertyKey, value: String) -> Result<(), CoreError> {
        self.values.insert(key.as_str().to_string(), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Write-through store at `<home>/.roster/properties.yaml`.
#[derive(Debug, Clone)]
pub struct FileProperties {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileProperties {
    /// Load the store rooted at `home`; a missing file is an empty store.
    pub fn load_at(home: &Path) -> Result<Self, CoreError> {
        let path = properties_path_at(home);
        if !path.exists() {
            return Ok(Self { path, values: BTreeMap::new() });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let values = if contents.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| CoreError::Parse { path: path.clone(), source: e })?
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Detached in-memory copy, for runs that must not persist anything.
    pub fn to_memory(&self) -> MemoryProperties {
        MemoryProperties::from(self.values.clone())
    }

    fn save(&self) -> Result<(), CoreError> {
        let yaml = serde_yaml::to_string(&self.values)?;
        write_atomic(&self.path, &yaml)
    }
}

impl PropertyStore for FileProperties {
    fn get(&self, key: PropertyKey) -> Option<String> {
        non_empty(self.values.get(key.as_str()))
    }

    fn set(&mut self, key: PropertyKey, value: String) -> Result<(), CoreError> {
        let previous = self.values.insert(key.as_str().to_string(), value);
        if let Err(err) = self.save() {
            match previous {
                Some(old) => self.values.insert(key.as_str().to_string(), old),
                None => self.values.remove(key.as_str()),
            };
            return Err(err);
        }
        Ok(())
    }

    fn set_many(&mut self, entries: Vec<(PropertyKey, String)>) -> Result<(), CoreError> {
        let previous = self.values.clone();
        for (key, value) in entries {
            self.values.insert(key.as_str().to_string(), value);
        }
        if let Err(err) = self.save() {
            self.values = previous;
            return Err(err);
        }
        Ok(())
    }
}
