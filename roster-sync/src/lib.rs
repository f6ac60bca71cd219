//! # roster-sync
//!
//! Staleness oracle, roster aggregator and the run pipeline tying them to
//! their collaborators.
//!
//! Call [`pipeline::run`] with a [`Collaborators`] set to evaluate staleness
//! and, when needed, rebuild and publish the roster.

pub mod aggregate;
pub mod collaborators;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod snapshot;
pub mod staleness;
pub mod writer;

pub use aggregate::{aggregate, Aggregation, AggregationIssue, OfficerRules, ResolvedGroups};
pub use collaborators::{
    AlterationSignal, Contacts, Directory, DocumentActivity, RosterSink, WriteResult,
};
pub use diff::{diff_document, DocumentDiff};
pub use error::{CollaboratorError, SyncError};
pub use pipeline::{run, Collaborators, RunMode, RunOptions, RunOutcome};
pub use snapshot::Snapshot;
pub use staleness::{RegenerateReason, StalenessDecision, StalenessPolicy};
pub use writer::{content_digest, FileActivity, FileDocument};
