//! # roster-google
//!
//! Google Workspace collaborators for the roster pipeline: Admin Directory
//! users, People contacts, Drive Activity and the Drive-hosted roster file,
//! over blocking HTTP.

pub mod client;
pub mod directory;
pub mod drive;
pub mod people;

pub use client::{classify, Endpoints, GoogleClient};
pub use directory::AdminDirectory;
pub use drive::{DriveActivity, DriveDocument};
pub use people::PeopleContacts;
