//! Roster core library: domain types, configuration, property store, errors.
//!
//! - [`types`]: newtypes, officer table, roster model
//! - [`config`]: `~/.roster/config.yaml`
//! - [`properties`]: persisted sync state and group identifiers
//! - [`paths`]: on-disk layout and atomic saves
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod properties;
pub mod types;

pub use config::RosterConfig;
pub use error::CoreError;
pub use properties::{FileProperties, MemoryProperties, PropertyKey, PropertyStore};
pub use types::{
    ChangeDelta, ContactGroupInfo, CustomerId, DirectoryUser, GroupKind, LocalId, OfficerHolder,
    OfficerRole, OfficerRoles, PersonRecord, ResourceName, RosterDocument, RosterMember,
    SyncState, SyncToken, VACANT,
};
