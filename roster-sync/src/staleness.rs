//! Staleness oracle: should the roster document be rebuilt?
//!
//! Reasons, in the order they are collected:
//! 1. `Forced` (force run)
//! 2. `NoBaseline` (no sync token stored yet)
//! 3. `ContactsChanged` (contacts provider reports churn since the token)
//! 4. `NeverRegenerated` (no last-update timestamp stored)
//! 5. `DocumentAltered` / `DocumentMissing` (touched after our last write,
//!    beyond the skew allowance)
//!
//! Any reason means regenerate. The evaluation never writes; it returns the
//! next [`SyncState`] and leaves persisting it to the pipeline.

use chrono::{DateTime, Utc};

use roster_core::config::PolicyConfig;
use roster_core::types::{ChangeDelta, SyncState, SyncToken};

use crate::collaborators::{AlterationSignal, Contacts, DocumentActivity};
use crate::error::{CollaboratorError, SyncError};

/// Why a regeneration is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateReason {
    Forced,
    NoBaseline,
    ContactsChanged { count: u64 },
    NeverRegenerated,
    DocumentAltered { at: DateTime<Utc> },
    DocumentMissing,
}

impl std::fmt::Display for RegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegenerateReason::Forced => write!(f, "forced"),
            RegenerateReason::NoBaseline => write!(f, "no sync baseline"),
            RegenerateReason::ContactsChanged { count } => {
                write!(f, "{count} contact change(s)")
            }
            RegenerateReason::NeverRegenerated => write!(f, "never regenerated"),
            RegenerateReason::DocumentAltered { at } => {
                write!(f, "document altered at {}", at.to_rfc3339())
            }
            RegenerateReason::DocumentMissing => write!(f, "document missing"),
        }
    }
}

/// Policy values for the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Lag between our write and the alteration source seeing it.
    pub skew_allowance: chrono::Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self { skew_allowance: chrono::Duration::minutes(1) }
    }
}

impl From<&PolicyConfig> for StalenessPolicy {
    fn from(policy: &PolicyConfig) -> Self {
        Self { skew_allowance: policy.skew_allowance() }
    }
}

/// Result of one oracle evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessDecision {
    pub reasons: Vec<RegenerateReason>,
    /// Delta the decision was based on.
    pub delta: ChangeDelta,
    /// The stored token had expired and the delta is a fresh baseline.
    pub token_reset: bool,
    pub activity: DocumentActivity,
    /// State to persist: the refreshed token, timestamp untouched.
    pub next_state: SyncState,
}

impl StalenessDecision {
    pub fn should_regenerate(&self) -> bool {
        !self.reasons.is_empty()
    }

    /// Token to persist, if the provider handed out a new one.
    pub fn refreshed_token(&self) -> Option<&SyncToken> {
        self.delta.refreshed_token.as_ref()
    }
}

/// Query the change feed, retrying exactly once with no token when the stored
/// token has expired.
///
/// Returns the delta and whether the retry happened.
pub fn fetch_delta(
    contacts: &dyn Contacts,
    token: Option<&SyncToken>,
) -> Result<(ChangeDelta, bool), CollaboratorError> {
    match contacts.list_changes_since(token) {
        Ok(delta) => Ok((delta, false)),
        Err(CollaboratorError::ExpiredSyncToken) if token.is_some() => {
            tracing::warn!("contacts sync token expired; requesting a fresh baseline");
            let delta = contacts.list_changes_since(None)?;
            Ok((delta, true))
        }
        Err(err) => Err(err),
    }
}

/// Was the document touched after our last regeneration (plus skew)?
///
/// Always true if we never regenerated or the document is gone.
pub fn document_altered(
    activity: DocumentActivity,
    last_updated: Option<DateTime<Utc>>,
    skew_allowance: chrono::Duration,
) -> bool {
    let Some(last_updated) = last_updated else {
        return true;
    };
    match activity {
        // Past the representable range nothing can be later.
        DocumentActivity::LastModified(at) => last_updated
            .checked_add_signed(skew_allowance)
            .is_some_and(|limit| at > limit),
        DocumentActivity::Missing => true,
        DocumentActivity::Unknown => false,
    }
}

/// Evaluate staleness for `state`.
///
/// All reads happen here: the change feed first, then the alteration
/// signal. A failure in either aborts the evaluation before anything could
/// be persisted.
pub fn evaluate(
    state: &SyncState,
    force: bool,
    contacts: &dyn Contacts,
    activity_source: &dyn AlterationSignal,
    document_id: &str,
    policy: &StalenessPolicy,
) -> Result<StalenessDecision, SyncError> {
    let (delta, token_reset) = fetch_delta(contacts, state.last_sync_token.as_ref())?;
    let activity = activity_source.last_activity(document_id)?;

    let mut reasons = Vec::new();
    if force {
        reasons.push(RegenerateReason::Forced);
    }
    if state.last_sync_token.is_none() {
        reasons.push(RegenerateReason::NoBaseline);
    } else if !token_reset && delta.total_changed > 0 {
        reasons.push(RegenerateReason::ContactsChanged { count: delta.total_changed });
    }
    match state.last_updated {
        None => reasons.push(RegenerateReason::NeverRegenerated),
        Some(_) if document_altered(activity, state.last_updated, policy.skew_allowance) => {
            reasons.push(match activity {
                DocumentActivity::LastModified(at) => RegenerateReason::DocumentAltered { at },
                _ => RegenerateReason::DocumentMissing,
            });
        }
        Some(_) => {}
    }

    let next_state = SyncState {
        last_sync_token: delta
            .refreshed_token
            .clone()
            .or_else(|| state.last_sync_token.clone()),
        last_updated: state.last_updated,
    };

    tracing::debug!(
        "staleness: changed={} token_reset={} reasons={:?}",
        delta.total_changed,
        token_reset,
        reasons
    );

    Ok(StalenessDecision {
        reasons,
        delta,
        token_reset,
        activity,
        next_state,
    })
}

/// Boolean form of [`evaluate`].
pub fn should_regenerate(
    state: &SyncState,
    force: bool,
    contacts: &dyn Contacts,
    activity_source: &dyn AlterationSignal,
    document_id: &str,
    policy: &StalenessPolicy,
) -> Result<bool, SyncError> {
    evaluate(state, force, contacts, activity_source, document_id, policy)
        .map(|d| d.should_regenerate())
}

/// Format age from a chrono timestamp (last update).
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let now = Utc::now();
    let age = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeSet, VecDeque};

    use chrono::TimeZone;
    use roster_core::types::{ContactGroupInfo, PersonRecord, ResourceName};

    /// Contacts stub replaying scripted change-feed answers.
    struct ScriptedFeed {
        answers: RefCell<VecDeque<Result<ChangeDelta, CollaboratorError>>>,
        calls: RefCell<Vec<Option<SyncToken>>>,
    }

    impl ScriptedFeed {
        fn new(answers: Vec<Result<ChangeDelta, CollaboratorError>>) -> Self {
            Self {
                answers: RefCell::new(answers.into()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Contacts for ScriptedFeed {
        fn list_changes_since(
            &self,
            token: Option<&SyncToken>,
        ) -> Result<ChangeDelta, CollaboratorError> {
            self.calls.borrow_mut().push(token.cloned());
            self.answers
                .borrow_mut()
                .pop_front()
                .expect("unexpected change-feed call")
        }

        fn list_groups(&self) -> Result<Vec<ContactGroupInfo>, CollaboratorError> {
            unreachable!("oracle never lists groups")
        }

        fn get_group_members(
            &self,
            _group: &ResourceName,
            _max_members: u32,
        ) -> Result<BTreeSet<ResourceName>, CollaboratorError> {
            unreachable!("oracle never reads groups")
        }

        fn batch_get_persons(
            &self,
            _ids: &[ResourceName],
        ) -> Result<Vec<PersonRecord>, CollaboratorError> {
            unreachable!("oracle never reads people")
        }
    }

    struct FixedActivity(DocumentActivity);

    impl AlterationSignal for FixedActivity {
        fn last_activity(&self, _document_id: &str) -> Result<DocumentActivity, CollaboratorError> {
            Ok(self.0)
        }
    }

    fn delta(count: u64, token: &str) -> ChangeDelta {
        ChangeDelta {
            total_changed: count,
            refreshed_token: Some(SyncToken::from(token)),
        }
    }

    fn last_update() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap()
    }

    fn synced_state() -> SyncState {
        SyncState {
            last_sync_token: Some(SyncToken::from("tok-1")),
            last_updated: Some(last_update()),
        }
    }

    fn modified(secs_after_update: i64) -> FixedActivity {
        FixedActivity(DocumentActivity::LastModified(
            last_update() + chrono::Duration::seconds(secs_after_update),
        ))
    }

    #[test]
    fn empty_token_always_regenerates() {
        let state = SyncState { last_sync_token: None, last_updated: Some(last_update()) };
        for count in [0, 3] {
            let feed = ScriptedFeed::new(vec![Ok(delta(count, "tok-2"))]);
            let decision = evaluate(
                &state,
                false,
                &feed,
                &modified(0),
                "doc",
                &StalenessPolicy::default(),
            )
            .expect("evaluate");
            assert!(decision.should_regenerate());
            assert!(decision.reasons.contains(&RegenerateReason::NoBaseline));
        }
    }

    #[test]
    fn quiet_contacts_and_own_write_do_not_regenerate() {
        for secs in [0, 30, 60] {
            let feed = ScriptedFeed::new(vec![Ok(delta(0, "tok-2"))]);
            let regenerate = should_regenerate(
                &synced_state(),
                false,
                &feed,
                &modified(secs),
                "doc",
                &StalenessPolicy::default(),
            )
            .expect("evaluate");
            assert!(!regenerate, "write {secs}s after update must be within skew");
        }
    }

    #[test]
    fn alteration_beyond_skew_regenerates() {
        let feed = ScriptedFeed::new(vec![Ok(delta(0, "tok-2"))]);
        let decision = evaluate(
            &synced_state(),
            false,
            &feed,
            &modified(61),
            "doc",
            &StalenessPolicy::default(),
        )
        .expect("evaluate");
        assert_eq!(
            decision.reasons,
            vec![RegenerateReason::DocumentAltered {
                at: last_update() + chrono::Duration::seconds(61)
            }]
        );
    }

    #[test]
    fn contact_changes_regenerate() {
        let feed = ScriptedFeed::new(vec![Ok(delta(2, "tok-2"))]);
        let decision = evaluate(
            &synced_state(),
            false,
            &feed,
            &modified(0),
            "doc",
            &StalenessPolicy::default(),
        )
        .expect("evaluate");
        assert_eq!(decision.reasons, vec![RegenerateReason::ContactsChanged { count: 2 }]);
        assert_eq!(decision.next_state.last_sync_token, Some(SyncToken::from("tok-2")));
        assert_eq!(decision.next_state.last_updated, Some(last_update()));
    }

    #[test]
    fn expired_token_retries_once_without_token() {
        let feed = ScriptedFeed::new(vec![
            Err(CollaboratorError::ExpiredSyncToken),
            Ok(delta(250, "fresh")),
        ]);
        let decision = evaluate(
            &synced_state(),
            false,
            &feed,
            &modified(0),
            "doc",
            &StalenessPolicy::default(),
        )
        .expect("evaluate");

        assert_eq!(
            *feed.calls.borrow(),
            vec![Some(SyncToken::from("tok-1")), None]
        );
        assert!(decision.token_reset);
        assert!(!decision.should_regenerate(), "baseline count is not churn");
        assert_eq!(decision.refreshed_token(), Some(&SyncToken::from("fresh")));
    }

    #[test]
    fn second_expiry_is_fatal() {
        let feed = ScriptedFeed::new(vec![
            Err(CollaboratorError::ExpiredSyncToken),
            Err(CollaboratorError::ExpiredSyncToken),
        ]);
        let err = evaluate(
            &synced_state(),
            false,
            &feed,
            &modified(0),
            "doc",
            &StalenessPolicy::default(),
        )
        .unwrap_err();
        assert!(err.is_expired_token());
        assert_eq!(feed.calls.borrow().len(), 2);
    }

    #[test]
    fn other_feed_errors_propagate_without_retry() {
        let feed = ScriptedFeed::new(vec![Err(CollaboratorError::Quota {
            service: "people",
            message: "rate limit".into(),
        })]);
        let err = evaluate(
            &synced_state(),
            false,
            &feed,
            &modified(0),
            "doc",
            &StalenessPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Collaborator(CollaboratorError::Quota { .. })
        ));
        assert_eq!(feed.calls.borrow().len(), 1);
    }

    #[test]
    fn force_regenerates_without_changes() {
        let feed = ScriptedFeed::new(vec![Ok(delta(0, "tok-2"))]);
        let decision = evaluate(
            &synced_state(),
            true,
            &feed,
            &modified(0),
            "doc",
            &StalenessPolicy::default(),
        )
        .expect("evaluate");
        assert_eq!(decision.reasons, vec![RegenerateReason::Forced]);
    }

    #[test]
    fn missing_timestamp_or_document_regenerates() {
        let skew = chrono::Duration::minutes(1);
        assert!(document_altered(DocumentActivity::Unknown, None, skew));
        assert!(document_altered(DocumentActivity::Missing, Some(last_update()), skew));
        assert!(!document_altered(DocumentActivity::Unknown, Some(last_update()), skew));
    }

    #[test]
    fn overflowing_skew_counts_as_unaltered() {
        let skew = chrono::Duration::days(365 * 1_000_000);
        let later = last_update() + chrono::Duration::days(1);
        assert!(!document_altered(DocumentActivity::LastModified(later), Some(last_update()), skew));
    }

    #[test]
    fn skew_allowance_is_configurable() {
        let policy = StalenessPolicy { skew_allowance: chrono::Duration::minutes(5) };
        let feed = ScriptedFeed::new(vec![Ok(delta(0, "tok-2"))]);
        let regenerate =
            should_regenerate(&synced_state(), false, &feed, &modified(240), "doc", &policy)
                .expect("evaluate");
        assert!(!regenerate);
    }

    #[test]
    fn token_kept_when_provider_returns_none() {
        let feed = ScriptedFeed::new(vec![Ok(ChangeDelta { total_changed: 0, refreshed_token: None })]);
        let decision = evaluate(
            &synced_state(),
            false,
            &feed,
            &modified(0),
            "doc",
            &StalenessPolicy::default(),
        )
        .expect("evaluate");
        assert_eq!(decision.refreshed_token(), None);
        assert_eq!(decision.next_state.last_sync_token, Some(SyncToken::from("tok-1")));
    }

    #[test]
    fn datetime_age_is_compact() {
        assert_eq!(format_datetime_age(Utc::now()), "0s");
        assert_eq!(format_seconds(65), "1m");
        assert_eq!(format_seconds(2 * 60 * 60), "2h");
        assert_eq!(format_seconds(3 * 24 * 60 * 60), "3d");
    }
}
