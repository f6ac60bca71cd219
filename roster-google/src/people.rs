//! People API as a [`Contacts`] collaborator.

use std::collections::BTreeSet;

use serde::Deserialize;

use roster_core::types::{ChangeDelta, ContactGroupInfo, PersonRecord, ResourceName, SyncToken};
use roster_sync::{CollaboratorError, Contacts};

use crate::client::GoogleClient;

const SERVICE: &str = "people";
const CONNECTIONS_PAGE_SIZE: u32 = 1000;
const GROUPS_PAGE_SIZE: u32 = 1000;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionsPage {
    #[serde(default)]
    connections: Vec<serde_json::Value>,
    #[serde(default)]
    total_people: Option<u64>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    next_sync_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupsPage {
    #[serde(default)]
    contact_groups: Vec<GroupResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupResource {
    #[serde(default)]
    resource_name: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    member_count: u32,
    #[serde(default)]
    member_resource_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchGetResponse {
    #[serde(default)]
    responses: Vec<PersonResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct PersonResponse {
    #[serde(default)]
    person: Option<PersonResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonResource {
    #[serde(default)]
    resource_name: String,
    #[serde(default)]
    names: Vec<PersonName>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonName {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    display_name_last_first: Option<String>,
}

impl From<PersonResource> for PersonRecord {
    fn from(person: PersonResource) -> Self {
        let primary = person.names.into_iter().next().unwrap_or_default();
        PersonRecord {
            resource_name: ResourceName(person.resource_name),
            display_name: primary.display_name,
            display_name_last_first: primary.display_name_last_first,
        }
    }
}

impl From<GroupResource> for ContactGroupInfo {
    fn from(group: GroupResource) -> Self {
        ContactGroupInfo {
            resource_name: ResourceName(group.resource_name),
            name: group.name,
            member_count: group.member_count,
        }
    }
}

/// Fold connection pages into a delta.
///
/// `totalPeople` of the first page is the change count while the token was
/// valid; the sync token arrives on the last page.
fn fold_delta(pages: Vec<ConnectionsPage>) -> ChangeDelta {
    let listed: u64 = pages.iter().map(|p| p.connections.len() as u64).sum();
    let total_changed = pages.first().and_then(|p| p.total_people).unwrap_or(listed);
    let refreshed_token = pages
        .iter()
        .rev()
        .find_map(|p| p.next_sync_token.clone())
        .filter(|t| !t.is_empty())
        .map(SyncToken);
    ChangeDelta { total_changed, refreshed_token }
}

// ---------------------------------------------------------------------------
// PeopleContacts
// ---------------------------------------------------------------------------

/// Contacts of the authenticated user.
#[derive(Clone)]
pub struct PeopleContacts {
    client: GoogleClient,
}

impl PeopleContacts {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

impl Contacts for PeopleContacts {
    fn list_changes_since(
        &self,
        token: Option<&SyncToken>,
    ) -> Result<ChangeDelta, CollaboratorError> {
        let url = format!("{}/people/me/connections", self.client.endpoints.people);
        let mut pages = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("personFields", "metadata".to_string()),
                ("pageSize", CONNECTIONS_PAGE_SIZE.to_string()),
                ("requestSyncToken", "true".to_string()),
            ];
            if let Some(token) = token {
                query.push(("syncToken", token.0.clone()));
            }
            if let Some(page) = &page_token {
                query.push(("pageToken", page.clone()));
            }
            let page: ConnectionsPage = self.client.get(SERVICE, &url, &query)?;
            page_token = page.next_page_token.clone().filter(|t| !t.is_empty());
            pages.push(page);
            if page_token.is_none() {
                break;
            }
        }
        Ok(fold_delta(pages))
    }

    fn list_groups(&self) -> Result<Vec<ContactGroupInfo>, CollaboratorError> {
        let url = format!("{}/contactGroups", self.client.endpoints.people);
        let mut groups = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("pageSize", GROUPS_PAGE_SIZE.to_string()),
                ("groupFields", "name,memberCount".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let page: GroupsPage = self.client.get(SERVICE, &url, &query)?;
            groups.extend(page.contact_groups.into_iter().map(ContactGroupInfo::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(groups)
    }

    fn get_group_members(
        &self,
        group: &ResourceName,
        max_members: u32,
    ) -> Result<BTreeSet<ResourceName>, CollaboratorError> {
        let url = format!("{}/{}", self.client.endpoints.people, group.0);
        let resource: GroupResource = self.client.get(
            SERVICE,
            &url,
            &[
                ("maxMembers", max_members.to_string()),
                ("groupFields", "name,memberCount".to_string()),
            ],
        )?;
        Ok(resource
            .member_resource_names
            .into_iter()
            .map(ResourceName)
            .collect())
    }

    fn batch_get_persons(
        &self,
        ids: &[ResourceName],
    ) -> Result<Vec<PersonRecord>, CollaboratorError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/people:batchGet", self.client.endpoints.people);
        let mut query = vec![("personFields", "names".to_string())];
        query.extend(ids.iter().map(|id| ("resourceNames", id.0.clone())));
        let response: BatchGetResponse = self.client.get(SERVICE, &url, &query)?;
        Ok(response
            .responses
            .into_iter()
            .filter_map(|r| r.person)
            .filter(|p| !p.resource_name.is_empty())
            .map(PersonRecord::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(raw: &str) -> ConnectionsPage {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn delta_uses_total_people_and_last_sync_token() {
        let delta = fold_delta(vec![
            page(r#"{"connections":[{},{}],"totalPeople":3,"nextPageToken":"p2"}"#),
            page(r#"{"connections":[{}],"nextSyncToken":"sync-2"}"#),
        ]);
        assert_eq!(delta.total_changed, 3);
        assert_eq!(delta.refreshed_token, Some(SyncToken::from("sync-2")));
    }

    #[test]
    fn delta_without_total_counts_connections() {
        let delta = fold_delta(vec![page(r#"{"connections":[{}],"nextSyncToken":""}"#)]);
        assert_eq!(delta.total_changed, 1);
        assert_eq!(delta.refreshed_token, None);
    }

    #[test]
    fn batch_get_keeps_first_name_entry() {
        let response: BatchGetResponse = serde_json::from_str(
            r#"{"responses":[
                {"person":{"resourceName":"people/c1","names":[
                    {"displayName":"Ann Smith","displayNameLastFirst":"Smith, Ann"},
                    {"displayName":"Annie"}]}},
                {"person":{"resourceName":"people/c2"}},
                {"httpStatusCode":404}
            ]}"#,
        )
        .unwrap();
        let people: Vec<PersonRecord> = response
            .responses
            .into_iter()
            .filter_map(|r| r.person)
            .map(PersonRecord::from)
            .collect();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].display_name_last_first.as_deref(), Some("Smith, Ann"));
        assert_eq!(people[1].display_name, None);
    }

    #[test]
    fn group_listing_maps_member_count() {
        let groups: GroupsPage = serde_json::from_str(
            r#"{"contactGroups":[{"resourceName":"contactGroups/abc","name":"Piper","memberCount":12}]}"#,
        )
        .unwrap();
        let info: Vec<ContactGroupInfo> =
            groups.contact_groups.into_iter().map(ContactGroupInfo::from).collect();
        assert_eq!(info[0].name, "Piper");
        assert_eq!(info[0].member_count, 12);
    }
}
