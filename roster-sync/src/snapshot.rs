//! Directory and contacts collaborators backed by a JSON snapshot file.
//!
//! Used for offline runs and fixtures.
//!
//! ```json
//! {
//!   "customer_id": "C01abc",
//!   "identities": ["admin@example.org"],
//!   "users": [{ "primary_email": "pm@example.org", "full_name": "Angus Bell",
//!               "org_unit_path": "/Officers", "suspended": false }],
//!   "groups": [{ "resource_name": "contactGroups/active", "name": "Active",
//!                "members": ["people/c1"] }],
//!   "people": [{ "resource_name": "people/c1", "display_name": "Ann Smith",
//!                "display_name_last_first": "Smith, Ann" }],
//!   "changes": { "current_token": "t2", "since": { "t1": 3 }, "expired": ["t0"] }
//! }
//! ```
//!
//! Tokens listed in `expired`, and tokens the change log has never seen,
//! are rejected as expired.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use roster_core::types::{
    ChangeDelta, ContactGroupInfo, CustomerId, DirectoryUser, PersonRecord, ResourceName,
    SyncToken,
};

use crate::collaborators::{Contacts, Directory};
use crate::error::{io_err, CollaboratorError, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotGroup {
    pub resource_name: ResourceName,
    pub name: String,
    #[serde(default)]
    pub members: Vec<ResourceName>,
    /// Reported member count; defaults to `members.len()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeLog {
    pub current_token: Option<SyncToken>,
    /// Change count reported for each still-valid token.
    pub since: BTreeMap<String, u64>,
    pub expired: BTreeSet<String>,
}

/// Whole snapshot document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub customer_id: Option<CustomerId>,
    /// Identities allowed to resolve the customer; empty allows any.
    pub identities: Vec<String>,
    pub users: Vec<DirectoryUser>,
    pub groups: Vec<SnapshotGroup>,
    pub people: Vec<PersonRecord>,
    pub changes: ChangeLog,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let snapshot = serde_json::from_str(&raw)?;
        tracing::debug!("loaded snapshot {}", path.display());
        Ok(snapshot)
    }

    pub fn from_json(raw: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Directory for Snapshot {
    fn resolve_customer(&self, identity: &str) -> Result<CustomerId, CollaboratorError> {
        let allowed = self.identities.is_empty() || self.identities.iter().any(|i| i == identity);
        match &self.customer_id {
            Some(customer) if allowed => Ok(customer.clone()),
            _ => Err(CollaboratorError::NoCustomerId { identity: identity.to_string() }),
        }
    }

    fn list_users(&self, customer: &CustomerId) -> Result<Vec<DirectoryUser>, CollaboratorError> {
        if self.customer_id.as_ref() != Some(customer) {
            return Ok(Vec::new());
        }
        Ok(self.users.clone())
    }
}

impl Contacts for Snapshot {
    fn list_changes_since(
        &self,
        token: Option<&SyncToken>,
    ) -> Result<ChangeDelta, CollaboratorError> {
        let total_changed = match token {
            None => self.people.len() as u64,
            Some(t) if self.changes.expired.contains(&t.0) => {
                return Err(CollaboratorError::ExpiredSyncToken)
            }
            Some(t) if self.changes.current_token.as_ref() == Some(t) => 0,
            Some(t) => match self.changes.since.get(&t.0) {
                Some(count) => *count,
                None => return Err(CollaboratorError::ExpiredSyncToken),
            },
        };
        Ok(ChangeDelta {
            total_changed,
            refreshed_token: self.changes.current_token.clone(),
        })
    }

    fn list_groups(&self) -> Result<Vec<ContactGroupInfo>, CollaboratorError> {
        Ok(self
            .groups
            .iter()
            .map(|g| ContactGroupInfo {
                resource_name: g.resource_name.clone(),
                name: g.name.clone(),
                member_count: g.member_count.unwrap_or(g.members.len() as u32),
            })
            .collect())
    }

    fn get_group_members(
        &self,
        group: &ResourceName,
        max_members: u32,
    ) -> Result<BTreeSet<ResourceName>, CollaboratorError> {
        let found = self
            .groups
            .iter()
            .find(|g| &g.resource_name == group)
            .ok_or_else(|| CollaboratorError::Http {
                service: "snapshot",
                status: 404,
                message: format!("contact group {group} not found"),
            })?;
        Ok(found.members.iter().take(max_members as usize).cloned().collect())
    }

    fn batch_get_persons(
        &self,
        ids: &[ResourceName],
    ) -> Result<Vec<PersonRecord>, CollaboratorError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.people.iter().find(|p| &p.resource_name == id))
            .cloned()
            .collect())
    }
}
