//! Domain types for the roster.
//!
//! Identifiers coming from the directory and contacts providers are opaque
//! strings wrapped in newtypes. The officer table is a closed enumeration so
//! every role is always present in a [`OfficerRoles`] value.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Local part of a directory user's primary email (`jdoe` in `jdoe@example.org`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(pub String);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for LocalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LocalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Contacts-provider resource name, e.g. `people/c123` or `contactGroups/abc`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceName(pub String);

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque cursor handed out by the contacts provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncToken(pub String);

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SyncToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SyncToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Directory customer scope resolved from the running identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CustomerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Officers
// ---------------------------------------------------------------------------

/// Leadership positions listed at the top of the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OfficerRole {
    #[serde(rename = "pm")]
    PipeMajor,
    #[serde(rename = "drum.sergeant")]
    DrumSergeant,
    #[serde(rename = "manager")]
    Manager,
    #[serde(rename = "secretary")]
    Secretary,
    #[serde(rename = "treasurer")]
    Treasurer,
    #[serde(rename = "quartermaster")]
    Quartermaster,
}

impl OfficerRole {
    /// All roles in roster order.
    pub fn all() -> &'static [OfficerRole] {
        &[
            OfficerRole::PipeMajor,
            OfficerRole::DrumSergeant,
            OfficerRole::Manager,
            OfficerRole::Secretary,
            OfficerRole::Treasurer,
            OfficerRole::Quartermaster,
        ]
    }

    /// Role key; also the default mailbox local part bound to the role.
    pub fn key(&self) -> &'static str {
        match self {
            OfficerRole::PipeMajor     => "pm",
            OfficerRole::DrumSergeant  => "drum.sergeant",
            OfficerRole::Manager       => "manager",
            OfficerRole::Secretary     => "secretary",
            OfficerRole::Treasurer     => "treasurer",
            OfficerRole::Quartermaster => "quartermaster",
        }
    }

    /// Human-readable title printed in the Officers section.
    pub fn title(&self) -> &'static str {
        match self {
            OfficerRole::PipeMajor     => "Pipe Major",
            OfficerRole::DrumSergeant  => "Drum Sergeant",
            OfficerRole::Manager       => "Manager",
            OfficerRole::Secretary     => "Secretary",
            OfficerRole::Treasurer     => "Treasurer",
            OfficerRole::Quartermaster => "Quartermaster",
        }
    }
}

impl fmt::Display for OfficerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Sentinel printed for a role nobody holds.
pub const VACANT: &str = "vacant";

/// Holder of an officer role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OfficerHolder {
    #[default]
    Vacant,
    Held(String),
}

impl OfficerHolder {
    pub fn is_vacant(&self) -> bool {
        matches!(self, OfficerHolder::Vacant)
    }
}

impl fmt::Display for OfficerHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfficerHolder::Vacant => f.write_str(VACANT),
            OfficerHolder::Held(name) => f.write_str(name),
        }
    }
}

impl From<String> for OfficerHolder {
    fn from(s: String) -> Self {
        if s.is_empty() || s == VACANT {
            OfficerHolder::Vacant
        } else {
            OfficerHolder::Held(s)
        }
    }
}

impl From<OfficerHolder> for String {
    fn from(h: OfficerHolder) -> Self {
        h.to_string()
    }
}

/// Complete officer table. Every [`OfficerRole`] always has an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<OfficerRole, OfficerHolder>",
    into = "BTreeMap<OfficerRole, OfficerHolder>"
)]
pub struct OfficerRoles {
    holders: BTreeMap<OfficerRole, OfficerHolder>,
}

impl OfficerRoles {
    /// Every role vacant.
    pub fn vacant() -> Self {
        let holders = OfficerRole::all()
            .iter()
            .map(|role| (*role, OfficerHolder::Vacant))
            .collect();
        Self { holders }
    }

    pub fn get(&self, role: OfficerRole) -> &OfficerHolder {
        static VACANT_HOLDER: OfficerHolder = OfficerHolder::Vacant;
        self.holders.get(&role).unwrap_or(&VACANT_HOLDER)
    }

    pub fn set(&mut self, role: OfficerRole, holder: OfficerHolder) {
        self.holders.insert(role, holder);
    }

    /// Roles and holders in roster order.
    pub fn iter(&self) -> impl Iterator<Item = (OfficerRole, &OfficerHolder)> {
        OfficerRole::all().iter().map(move |role| (*role, self.get(*role)))
    }
}

impl Default for OfficerRoles {
    fn default() -> Self {
        Self::vacant()
    }
}

impl From<BTreeMap<OfficerRole, OfficerHolder>> for OfficerRoles {
    fn from(map: BTreeMap<OfficerRole, OfficerHolder>) -> Self {
        let mut roles = Self::vacant();
        for (role, holder) in map {
            roles.set(role, holder);
        }
        roles
    }
}

impl From<OfficerRoles> for BTreeMap<OfficerRole, OfficerHolder> {
    fn from(roles: OfficerRoles) -> Self {
        roles.holders
    }
}

// ---------------------------------------------------------------------------
// Provider records
// ---------------------------------------------------------------------------

/// A user account as listed by the directory provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub primary_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// `None` when the provider does not report organizational units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(default)]
    pub suspended: bool,
}

impl DirectoryUser {
    /// Local part of the primary email, or `None` if the address has none.
    pub fn local_id(&self) -> Option<LocalId> {
        let local = self.primary_email.split('@').next()?.trim();
        if local.is_empty() {
            None
        } else {
            Some(LocalId::from(local))
        }
    }
}

/// Contact group metadata as reported by the group listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactGroupInfo {
    pub resource_name: ResourceName,
    pub name: String,
    #[serde(default)]
    pub member_count: u32,
}

/// A person record returned by a batch lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub resource_name: ResourceName,
    /// "First Last".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// "Last, First".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name_last_first: Option<String>,
}

/// Result of asking the contacts provider what changed since a sync token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeDelta {
    pub total_changed: u64,
    pub refreshed_token: Option<SyncToken>,
}

/// The three contact groups the roster is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Active,
    Piper,
    Drummer,
}

impl GroupKind {
    pub fn all() -> &'static [GroupKind] {
        &[GroupKind::Active, GroupKind::Piper, GroupKind::Drummer]
    }

    /// Group name used when no resource name is configured.
    pub fn default_name(&self) -> &'static str {
        match self {
            GroupKind::Active  => "Active",
            GroupKind::Piper   => "Piper",
            GroupKind::Drummer => "Drummer",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Active => write!(f, "active"),
            GroupKind::Piper => write!(f, "piper"),
            GroupKind::Drummer => write!(f, "drummer"),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster model
// ---------------------------------------------------------------------------

/// One line in an instrument section.
///
/// Field order matters: the derived `Ord` compares `sort_key` first, then
/// `display_name`, which gives a total order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RosterMember {
    pub sort_key: String,
    pub display_name: String,
}

/// Canonical roster handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosterDocument {
    pub officers: OfficerRoles,
    pub pipers: Vec<RosterMember>,
    pub drummers: Vec<RosterMember>,
}

/// Synchronization state carried between runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    pub last_sync_token: Option<SyncToken>,
    pub last_updated: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> DirectoryUser {
        DirectoryUser {
            primary_email: email.to_string(),
            full_name: Some("Jane Doe".to_string()),
            org_unit_path: None,
            suspended: false,
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(LocalId::from("jdoe").to_string(), "jdoe");
        assert_eq!(ResourceName::from("people/c1").to_string(), "people/c1");
        assert_eq!(SyncToken::from("tok").to_string(), "tok");
    }

    #[test]
    fn local_id_is_email_local_part() {
        assert_eq!(user("jdoe@example.org").local_id(), Some(LocalId::from("jdoe")));
        assert_eq!(
            user("drum.sergeant@example.org").local_id(),
            Some(LocalId::from("drum.sergeant"))
        );
        assert_eq!(user("@example.org").local_id(), None);
    }

    #[test]
    fn vacant_roles_cover_every_role() {
        let roles = OfficerRoles::vacant();
        assert_eq!(roles.iter().count(), OfficerRole::all().len());
        assert!(roles.iter().all(|(_, h)| h.is_vacant()));
    }

    #[test]
    fn officer_roles_deserialize_fills_missing_roles() {
        let yaml = "pm: Angus Bell\n";
        let roles: OfficerRoles = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(
            roles.get(OfficerRole::PipeMajor),
            &OfficerHolder::Held("Angus Bell".to_string())
        );
        assert_eq!(roles.get(OfficerRole::Treasurer).to_string(), "vacant");
    }

    #[test]
    fn officer_roles_serialize_with_vacant_sentinel() {
        let yaml = serde_yaml::to_string(&OfficerRoles::vacant()).expect("serialize");
        assert!(yaml.contains("drum.sergeant: vacant"));
        assert!(yaml.contains("quartermaster: vacant"));
    }

    #[test]
    fn roster_member_order_is_total() {
        let mut members = vec![
            RosterMember { sort_key: "SMITH, ANN".into(), display_name: "Ann Smith".into() },
            RosterMember { sort_key: "ADAMS, BOB".into(), display_name: "Bob Adams".into() },
            RosterMember { sort_key: "ADAMS, BOB".into(), display_name: "Bob  Adams".into() },
        ];
        members.sort();
        assert_eq!(members[0].display_name, "Bob  Adams");
        assert_eq!(members[1].display_name, "Bob Adams");
        assert_eq!(members[2].display_name, "Ann Smith");
    }

    #[test]
    fn role_titles_follow_roster_order() {
        let titles: Vec<_> = OfficerRole::all().iter().map(|r| r.title()).collect();
        assert_eq!(
            titles,
            vec!["Pipe Major", "Drum Sergeant", "Manager", "Secretary", "Treasurer", "Quartermaster"]
        );
    }
}
