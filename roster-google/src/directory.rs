//! Admin Directory API as a [`Directory`] collaborator.

use serde::Deserialize;

use roster_core::types::{CustomerId, DirectoryUser};
use roster_sync::{CollaboratorError, Directory};

use crate::client::GoogleClient;

const SERVICE: &str = "directory";
const PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResource {
    #[serde(default)]
    primary_email: String,
    #[serde(default)]
    name: Option<UserName>,
    #[serde(default)]
    org_unit_path: Option<String>,
    #[serde(default)]
    suspended: bool,
    #[serde(default)]
    customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserName {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersPage {
    #[serde(default)]
    users: Vec<UserResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl From<UserResource> for DirectoryUser {
    fn from(user: UserResource) -> Self {
        DirectoryUser {
            primary_email: user.primary_email,
            full_name: user.name.and_then(|n| n.full_name),
            org_unit_path: user.org_unit_path,
            suspended: user.suspended,
        }
    }
}

/// Users of a Workspace customer.
#[derive(Clone)]
pub struct AdminDirectory {
    client: GoogleClient,
}

impl AdminDirectory {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

impl Directory for AdminDirectory {
    fn resolve_customer(&self, identity: &str) -> Result<CustomerId, CollaboratorError> {
        let url = format!("{}/users/{identity}", self.client.endpoints.directory);
        let user: UserResource = self
            .client
            .get(SERVICE, &url, &[("fields", "customerId".to_string())])?;
        user.customer_id
            .filter(|id| !id.is_empty())
            .map(CustomerId)
            .ok_or_else(|| CollaboratorError::NoCustomerId { identity: identity.to_string() })
    }

    fn list_users(&self, customer: &CustomerId) -> Result<Vec<DirectoryUser>, CollaboratorError> {
        let url = format!("{}/users", self.client.endpoints.directory);
        let mut users = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("customer", customer.0.clone()),
                ("maxResults", PAGE_SIZE.to_string()),
                ("orderBy", "email".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let page: UsersPage = self.client.get(SERVICE, &url, &query)?;
            users.extend(page.users.into_iter().map(DirectoryUser::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        tracing::debug!("directory listed {} user(s)", users.len());
        Ok(users)
    }
}
