//! Roster aggregation: directory users and contact groups in, a canonical
//! [`RosterDocument`] out.
//!
//! ## Steps
//!
//! 1. Officers: eligible directory users keyed by email local part, each
//!    role looked up by its configured binding (`vacant` when unmatched).
//! 2. Active set: members of the "active" contact group.
//! 3. Pipers / drummers: group members ∩ active set, resolved to person
//!    records in chunks of [`BATCH_LIMIT`].
//! 4. Sort key = "Last, First" upper-cased, display name = "First Last".
//! 5. Each section sorted ascending, deduplicated by resource name.
//!
//! Malformed records are skipped and reported as [`AggregationIssue`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use roster_core::config::{GroupNames, RosterConfig};
use roster_core::properties::PropertyStore;
use roster_core::types::{
    ContactGroupInfo, DirectoryUser, GroupKind, LocalId, OfficerHolder, OfficerRole,
    OfficerRoles, PersonRecord, ResourceName, RosterDocument, RosterMember,
};

use crate::collaborators::Contacts;
use crate::error::SyncError;

/// Maximum resource names per person batch lookup.
pub const BATCH_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Non-fatal problem found while aggregating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationIssue {
    /// Two eligible users share the local part bound to `role`; the last one
    /// listed was kept.
    RoleConflict {
        role: OfficerRole,
        kept: String,
        dropped: String,
    },
    /// Directory user without a usable local part or full name.
    MalformedUser { email: String, missing: &'static str },
    /// Person record without a display name form.
    MalformedPerson {
        resource_name: ResourceName,
        missing: &'static str,
    },
}

impl fmt::Display for AggregationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationIssue::RoleConflict { role, kept, dropped } => write!(
                f,
                "several users match officer role {role}; kept {kept:?}, dropped {dropped:?}"
            ),
            AggregationIssue::MalformedUser { email, missing } => {
                write!(f, "directory user {email:?} has no {missing}; skipped")
            }
            AggregationIssue::MalformedPerson { resource_name, missing } => {
                write!(f, "person {resource_name} has no {missing}; skipped")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Officers
// ---------------------------------------------------------------------------

/// Officer eligibility and role bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficerRules {
    pub org_unit: Option<String>,
    pub bindings: BTreeMap<OfficerRole, LocalId>,
    pub exclude_suspended: bool,
    pub restrict_to_org_unit: bool,
}

impl OfficerRules {
    pub fn from_config(config: &RosterConfig) -> Self {
        Self {
            org_unit: config.officers.org_unit.clone(),
            bindings: OfficerRole::all()
                .iter()
                .map(|role| (*role, config.officers.binding(*role)))
                .collect(),
            exclude_suspended: config.policy.exclude_suspended,
            restrict_to_org_unit: config.policy.restrict_to_org_unit,
        }
    }

    /// Whether `user` may hold an officer role.
    ///
    /// The org-unit restriction only applies to users that report an org
    /// unit; otherwise every non-suspended user is a candidate.
    pub fn is_eligible(&self, user: &DirectoryUser) -> bool {
        if self.exclude_suspended && user.suspended {
            return false;
        }
        match (&self.org_unit, &user.org_unit_path) {
            (Some(required), Some(actual)) if self.restrict_to_org_unit => {
                in_org_unit(actual, required)
            }
            _ => true,
        }
    }
}

impl Default for OfficerRules {
    fn default() -> Self {
        Self::from_config(&RosterConfig::default())
    }
}

fn in_org_unit(actual: &str, required: &str) -> bool {
    let required = required.trim_end_matches('/');
    actual == required
        || actual
            .strip_prefix(required)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Resolve every officer role against `users`.
pub fn resolve_officers(
    users: &[DirectoryUser],
    rules: &OfficerRules,
) -> (OfficerRoles, Vec<AggregationIssue>) {
    let mut issues = Vec::new();
    let mut names: BTreeMap<LocalId, String> = BTreeMap::new();

    for user in users.iter().filter(|u| rules.is_eligible(u)) {
        let Some(local_id) = user.local_id() else {
            issues.push(AggregationIssue::MalformedUser {
                email: user.primary_email.clone(),
                missing: "local part",
            });
            continue;
        };
        let Some(full_name) = non_blank(&user.full_name) else {
            issues.push(AggregationIssue::MalformedUser {
                email: user.primary_email.clone(),
                missing: "full name",
            });
            continue;
        };
        if let Some(previous) = names.insert(local_id.clone(), full_name.to_string()) {
            if previous == full_name {
                continue;
            }
            for (role, _) in rules.bindings.iter().filter(|(_, bound)| **bound == local_id) {
                issues.push(AggregationIssue::RoleConflict {
                    role: *role,
                    kept: full_name.to_string(),
                    dropped: previous.clone(),
                });
            }
        }
    }

    let mut roles = OfficerRoles::vacant();
    for (role, local_id) in &rules.bindings {
        if let Some(name) = names.get(local_id) {
            roles.set(*role, OfficerHolder::Held(name.clone()));
        }
    }
    (roles, issues)
}

// ---------------------------------------------------------------------------
// Contact groups
// ---------------------------------------------------------------------------

/// The three contact groups a roster is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroups {
    pub active: ContactGroupInfo,
    pub piper: ContactGroupInfo,
    pub drummer: ContactGroupInfo,
}

impl ResolvedGroups {
    pub fn get(&self, kind: GroupKind) -> &ContactGroupInfo {
        match kind {
            GroupKind::Active => &self.active,
            GroupKind::Piper => &self.piper,
            GroupKind::Drummer => &self.drummer,
        }
    }
}

/// Locate the active, piper and drummer groups in the contact group listing.
///
/// A `RESOURCE_NAME_*` property takes precedence; without one the group is
/// matched by its configured name. Neither resolving is a configuration
/// error.
pub fn resolve_groups(
    contacts: &dyn Contacts,
    properties: &dyn PropertyStore,
    names: &GroupNames,
) -> Result<ResolvedGroups, SyncError> {
    let listing = contacts.list_groups()?;
    let find = |kind: GroupKind| -> Result<ContactGroupInfo, SyncError> {
        match properties.group_resource(kind) {
            Some(resource) => listing
                .iter()
                .find(|g| g.resource_name == resource)
                .cloned()
                .ok_or_else(|| {
                    SyncError::Config(format!("{kind} contact group {resource} does not exist"))
                }),
            None => {
                let name = names.name(kind);
                listing
                    .iter()
                    .find(|g| g.name == name)
                    .cloned()
                    .ok_or_else(|| {
                        SyncError::Config(format!(
                            "no resource name configured for the {kind} contact group and no group named {name:?}"
                        ))
                    })
            }
        }
    };
    Ok(ResolvedGroups {
        active: find(GroupKind::Active)?,
        piper: find(GroupKind::Piper)?,
        drummer: find(GroupKind::Drummer)?,
    })
}

fn group_members(
    contacts: &dyn Contacts,
    group: &ContactGroupInfo,
) -> Result<BTreeSet<ResourceName>, SyncError> {
    Ok(contacts.get_group_members(&group.resource_name, group.member_count)?)
}

/// Person records for `ids`, looked up [`BATCH_LIMIT`] at a time.
pub fn batch_persons(
    contacts: &dyn Contacts,
    ids: &[ResourceName],
) -> Result<Vec<PersonRecord>, SyncError> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(BATCH_LIMIT) {
        out.extend(contacts.batch_get_persons(chunk)?);
    }
    Ok(out)
}

/// Sort key and display name for `person`, or the missing field.
pub fn roster_member(person: &PersonRecord) -> Result<RosterMember, &'static str> {
    let last_first = non_blank(&person.display_name_last_first).ok_or("last-first name")?;
    let display = non_blank(&person.display_name).ok_or("display name")?;
    Ok(RosterMember {
        sort_key: last_first.to_uppercase(),
        display_name: display.to_string(),
    })
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn section_members(
    persons: &[PersonRecord],
    wanted: &BTreeSet<ResourceName>,
    issues: &mut Vec<AggregationIssue>,
) -> Vec<RosterMember> {
    let mut seen = BTreeSet::new();
    let mut members = Vec::new();
    for person in persons.iter().filter(|p| wanted.contains(&p.resource_name)) {
        if !seen.insert(&person.resource_name) {
            continue;
        }
        match roster_member(person) {
            Ok(member) => members.push(member),
            Err(missing) => issues.push(AggregationIssue::MalformedPerson {
                resource_name: person.resource_name.clone(),
                missing,
            }),
        }
    }
    members.sort();
    members
}

// ---------------------------------------------------------------------------
// aggregate
// ---------------------------------------------------------------------------

/// Aggregator output: the document plus anything skipped on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub document: RosterDocument,
    pub issues: Vec<AggregationIssue>,
}

/// Build the roster from `users` and the resolved contact groups.
pub fn aggregate(
    users: &[DirectoryUser],
    rules: &OfficerRules,
    contacts: &dyn Contacts,
    groups: &ResolvedGroups,
) -> Result<Aggregation, SyncError> {
    let (officers, mut issues) = resolve_officers(users, rules);

    let active = group_members(contacts, &groups.active)?;
    let pipers: BTreeSet<ResourceName> = group_members(contacts, &groups.piper)?
        .intersection(&active)
        .cloned()
        .collect();
    let drummers: BTreeSet<ResourceName> = group_members(contacts, &groups.drummer)?
        .intersection(&active)
        .cloned()
        .collect();

    let lookup: Vec<ResourceName> = pipers.union(&drummers).cloned().collect();
    let persons = batch_persons(contacts, &lookup)?;

    let document = RosterDocument {
        officers,
        pipers: section_members(&persons, &pipers, &mut issues),
        drummers: section_members(&persons, &drummers, &mut issues),
    };

    for issue in &issues {
        tracing::warn!("{issue}");
    }
    tracing::debug!(
        "aggregated {} piper(s), {} drummer(s) from {} active member(s)",
        document.pipers.len(),
        document.drummers.len(),
        active.len()
    );

    Ok(Aggregation { document, issues })
}
