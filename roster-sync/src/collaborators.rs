//! Capability traits for the systems a roster run talks to.
//!
//! The staleness oracle and the aggregator only see these traits; concrete
//! implementations (snapshot file, Google APIs, local document file) are
//! picked at the CLI boundary.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use roster_core::types::{
    ChangeDelta, ContactGroupInfo, CustomerId, DirectoryUser, PersonRecord, ResourceName,
    RosterDocument, SyncToken,
};

use crate::error::{CollaboratorError, SyncError};

/// Directory service: user accounts scoped to a customer.
pub trait Directory {
    /// Map the running identity to its customer scope.
    ///
    /// Fails with [`CollaboratorError::NoCustomerId`] when the identity has none.
    fn resolve_customer(&self, identity: &str) -> Result<CustomerId, CollaboratorError>;

    fn list_users(&self, customer: &CustomerId) -> Result<Vec<DirectoryUser>, CollaboratorError>;
}

/// Contacts service: change feed, contact groups and person lookups.
pub trait Contacts {
    /// Changes since `token` (`None` for a full listing).
    ///
    /// Fails with [`CollaboratorError::ExpiredSyncToken`] when the provider
    /// no longer accepts `token`.
    fn list_changes_since(&self, token: Option<&SyncToken>)
        -> Result<ChangeDelta, CollaboratorError>;

    fn list_groups(&self) -> Result<Vec<ContactGroupInfo>, CollaboratorError>;

    /// Up to `max_members` member resource names of `group`.
    fn get_group_members(
        &self,
        group: &ResourceName,
        max_members: u32,
    ) -> Result<BTreeSet<ResourceName>, CollaboratorError>;

    /// Person records for `ids`. Unknown ids are omitted from the result.
    fn batch_get_persons(&self, ids: &[ResourceName])
        -> Result<Vec<PersonRecord>, CollaboratorError>;
}

/// What the alteration source knows about the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentActivity {
    /// Most recent modification, from any writer.
    LastModified(DateTime<Utc>),
    /// The document does not exist.
    Missing,
    /// The source has no record of activity.
    Unknown,
}

/// Alteration signal: when was the document last touched, independent of
/// our own bookkeeping.
pub trait AlterationSignal {
    fn last_activity(&self, document_id: &str) -> Result<DocumentActivity, CollaboratorError>;
}

/// Outcome of publishing a rendered roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Content was replaced.
    Written { document: String, digest: String },
    /// Rendered content already matched the document.
    Unchanged { document: String, digest: String },
    /// Dry run: the document *would* have been replaced.
    WouldWrite { document: String, digest: String },
}

impl WriteResult {
    pub fn digest(&self) -> &str {
        match self {
            WriteResult::Written { digest, .. }
            | WriteResult::Unchanged { digest, .. }
            | WriteResult::WouldWrite { digest, .. } => digest,
        }
    }
}

/// Rendering surface. Publishing clears and fully rewrites prior content.
pub trait RosterSink {
    /// Identifier used for the file-based alteration signal.
    fn document_id(&self) -> String;

    fn render(&self, doc: &RosterDocument) -> Result<String, SyncError>;

    /// Current document content, `None` if it does not exist yet.
    fn current(&self) -> Result<Option<String>, SyncError>;

    fn publish(&mut self, rendered: &str) -> Result<WriteResult, SyncError>;
}
