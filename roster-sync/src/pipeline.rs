//! Shared run entrypoint used by the CLI and the scheduler.
//!
//! ## Run protocol
//!
//! 1. Resolve the identity's customer scope and the document id (fatal
//!    configuration errors surface here, before anything is persisted).
//! 2. Evaluate staleness (change feed, then alteration signal).
//! 3. Up to date: persist the refreshed token and stop.
//! 4. Stale: aggregate, render, publish; then persist the token,
//!    `LAST_UPDATED` and `DOCUMENT_DIGEST` in a single store write.
//!
//! A failure anywhere leaves persisted state as it was. Dry runs never
//! persist or publish.

use chrono::{DateTime, Utc};

use roster_core::config::{ActivitySource, RosterConfig};
use roster_core::properties::{timestamp_value, PropertyKey, PropertyStore};
use roster_core::types::{CustomerId, RosterDocument, SyncToken};

use crate::aggregate::{aggregate, resolve_groups, Aggregation, AggregationIssue, OfficerRules};
use crate::collaborators::{AlterationSignal, Contacts, Directory, RosterSink, WriteResult};
use crate::staleness::{evaluate, StalenessDecision, StalenessPolicy};
use crate::writer::content_digest;
use crate::SyncError;

/// Scheduled runs honour the staleness oracle; forced runs always rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Scheduled,
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn scheduled() -> Self {
        Self::default()
    }

    pub fn force() -> Self {
        Self { mode: RunMode::Force, dry_run: false }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Everything a run talks to, selected by the caller.
pub struct Collaborators<'a> {
    pub directory: &'a dyn Directory,
    pub contacts: &'a dyn Contacts,
    pub activity: &'a dyn AlterationSignal,
    pub properties: &'a mut dyn PropertyStore,
    pub sink: &'a mut dyn RosterSink,
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub decision: StalenessDecision,
    /// `None` when the document was already up to date.
    pub write: Option<WriteResult>,
    pub document: Option<RosterDocument>,
    pub issues: Vec<AggregationIssue>,
    /// Timestamp persisted as `LAST_UPDATED`, if any.
    pub last_updated: Option<DateTime<Utc>>,
    pub dry_run: bool,
}

impl RunOutcome {
    pub fn regenerated(&self) -> bool {
        self.write.is_some()
    }
}

/// Customer scope for the configured identity.
pub fn resolve_customer(
    config: &RosterConfig,
    directory: &dyn Directory,
) -> Result<CustomerId, SyncError> {
    let identity = config
        .identity
        .as_deref()
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| SyncError::Config("no identity configured (set `identity` in config.yaml)".into()))?;
    Ok(directory.resolve_customer(identity)?)
}

/// Id the alteration signal is queried with.
///
/// File activity uses the sink's own id; Drive activity needs the
/// `DOCUMENT_ID` property.
pub fn resolve_document_id(
    config: &RosterConfig,
    properties: &dyn PropertyStore,
    sink: &dyn RosterSink,
) -> Result<String, SyncError> {
    match config.document.activity {
        ActivitySource::File => Ok(sink.document_id()),
        ActivitySource::Drive => properties.get(PropertyKey::DocumentId).ok_or_else(|| {
            SyncError::Config(format!(
                "{} property is required for drive activity",
                PropertyKey::DocumentId
            ))
        }),
    }
}

/// Aggregate the roster for an already resolved customer.
pub fn build_document_for(
    config: &RosterConfig,
    customer: &CustomerId,
    directory: &dyn Directory,
    contacts: &dyn Contacts,
    properties: &dyn PropertyStore,
) -> Result<Aggregation, SyncError> {
    let users = directory.list_users(customer)?;
    let groups = resolve_groups(contacts, properties, &config.groups)?;
    aggregate(&users, &OfficerRules::from_config(config), contacts, &groups)
}

/// Aggregate the roster without consulting the staleness oracle. Used by
/// `diff` and previews.
pub fn build_document(
    config: &RosterConfig,
    directory: &dyn Directory,
    contacts: &dyn Contacts,
    properties: &dyn PropertyStore,
) -> Result<Aggregation, SyncError> {
    let customer = resolve_customer(config, directory)?;
    build_document_for(config, &customer, directory, contacts, properties)
}

/// Run the pipeline once.
pub fn run(
    config: &RosterConfig,
    collab: Collaborators<'_>,
    options: RunOptions,
) -> Result<RunOutcome, SyncError> {
    let Collaborators { directory, contacts, activity, properties, sink } = collab;

    let customer = resolve_customer(config, directory)?;
    let document_id = resolve_document_id(config, &*properties, &*sink)?;
    let state = properties.sync_state()?;

    let policy = StalenessPolicy::from(&config.policy);
    let force = options.mode == RunMode::Force;
    let decision = evaluate(&state, force, contacts, activity, &document_id, &policy)?;
    let refreshed = decision.refreshed_token().cloned();

    if !decision.should_regenerate() {
        tracing::info!("roster up to date ({document_id})");
        if !options.dry_run {
            persist_token(properties, refreshed.as_ref(), state.last_sync_token.as_ref())?;
        }
        return Ok(RunOutcome {
            decision,
            write: None,
            document: None,
            issues: Vec::new(),
            last_updated: None,
            dry_run: options.dry_run,
        });
    }

    let reasons: Vec<String> = decision.reasons.iter().map(ToString::to_string).collect();
    tracing::info!("regenerating roster: {}", reasons.join(", "));

    let Aggregation { document, issues } =
        build_document_for(config, &customer, directory, contacts, &*properties)?;
    let rendered = sink.render(&document)?;

    if options.dry_run {
        let digest = content_digest(&rendered);
        let current = sink.current()?.map(|c| content_digest(&c));
        let document_id = sink.document_id();
        let write = if current.as_deref() == Some(digest.as_str()) {
            WriteResult::Unchanged { document: document_id, digest }
        } else {
            tracing::info!("[dry-run] would write: {document_id}");
            WriteResult::WouldWrite { document: document_id, digest }
        };
        return Ok(RunOutcome {
            decision,
            write: Some(write),
            document: Some(document),
            issues,
            last_updated: None,
            dry_run: true,
        });
    }

    let write = sink.publish(&rendered)?;
    let now = Utc::now();
    let mut entries = Vec::with_capacity(3);
    if let Some(token) = changed_token(refreshed.as_ref(), state.last_sync_token.as_ref()) {
        entries.push((PropertyKey::ConnectionsSyncToken, token.0.clone()));
    }
    entries.push((PropertyKey::LastUpdated, timestamp_value(now)));
    entries.push((PropertyKey::DocumentDigest, write.digest().to_string()));
    properties.set_many(entries)?;

    Ok(RunOutcome {
        decision,
        write: Some(write),
        document: Some(document),
        issues,
        last_updated: Some(now),
        dry_run: false,
    })
}

fn changed_token<'a>(
    refreshed: Option<&'a SyncToken>,
    stored: Option<&SyncToken>,
) -> Option<&'a SyncToken> {
    refreshed.filter(|token| Some(*token) != stored)
}

fn persist_token(
    properties: &mut dyn PropertyStore,
    refreshed: Option<&SyncToken>,
    stored: Option<&SyncToken>,
) -> Result<(), SyncError> {
    if let Some(token) = changed_token(refreshed, stored) {
        tracing::debug!("persisting refreshed sync token");
        properties.set_sync_token(token)?;
    }
    Ok(())
}
