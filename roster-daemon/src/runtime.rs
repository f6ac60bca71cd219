use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use roster_core::paths::write_atomic;
use roster_sync::{RunOutcome, SyncError, WriteResult};

use crate::error::{io_err, DaemonError};
use crate::paths::{last_run_path, logs_dir, run_dir};

/// One roster run, as handed to the scheduler.
pub type Job = dyn Fn() -> Result<RunOutcome, SyncError> + Send + Sync;

const LOG_ROTATION_EVERY: Duration = Duration::from_secs(60);

/// Result of one run, persisted to `~/.roster/run/last-run.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub finished_at_unix: u64,
    pub ok: bool,
    pub regenerated: bool,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
    pub issues: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn from_outcome(outcome: &RunOutcome, elapsed: Duration) -> Self {
        let write = outcome.write.as_ref().map(|w| match w {
            WriteResult::Written { .. } => "written",
            WriteResult::Unchanged { .. } => "unchanged",
            WriteResult::WouldWrite { .. } => "would-write",
        });
        Self {
            finished_at_unix: unix_seconds_now(),
            ok: true,
            regenerated: outcome.regenerated(),
            dry_run: outcome.dry_run,
            reasons: outcome.decision.reasons.iter().map(ToString::to_string).collect(),
            write: write.map(str::to_string),
            issues: outcome.issues.len(),
            error: None,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failed(err: &SyncError, elapsed: Duration) -> Self {
        Self {
            finished_at_unix: unix_seconds_now(),
            ok: false,
            regenerated: false,
            dry_run: false,
            reasons: Vec::new(),
            write: None,
            issues: 0,
            error: Some(err.to_string()),
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Persist `summary` as the last run.
pub fn record_last_run(home: &Path, summary: &RunSummary) -> Result<(), DaemonError> {
    let dir = run_dir(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let json = serde_json::to_string_pretty(summary)?;
    write_atomic(&last_run_path(home), &json)?;
    Ok(())
}

/// Last recorded run, if any.
pub fn read_last_run(home: &Path) -> Result<Option<RunSummary>, DaemonError> {
    let path = last_run_path(home);
    match std::fs::read_to_string(&path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(&path, err)),
    }
}

/// Run `job` once, log and record the result.
///
/// Dry runs are not recorded. The job's own error is returned after being
/// recorded.
pub fn execute_once(home: &Path, job: &Job) -> Result<RunOutcome, DaemonError> {
    let started = Instant::now();
    let result = job();
    let elapsed = started.elapsed();

    let summary = match &result {
        Ok(outcome) => RunSummary::from_outcome(outcome, elapsed),
        Err(err) => RunSummary::failed(err, elapsed),
    };
    match &result {
        Ok(_) => tracing::info!(
            regenerated = summary.regenerated,
            write = summary.write.as_deref().unwrap_or("-"),
            issues = summary.issues,
            duration_ms = summary.duration_ms,
            "roster run finished"
        ),
        Err(err) => tracing::error!(error = %err, "roster run failed"),
    }
    if !summary.dry_run {
        if let Err(err) = record_last_run(home, &summary) {
            tracing::warn!(error = %err, "could not record last run");
        }
    }
    result.map_err(DaemonError::from)
}

/// Start the scheduler and block the current thread until it exits.
pub fn start_blocking(home: &Path, interval: Duration, job: Arc<Job>) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), interval, job))
}

/// Run `job` every `interval` until Ctrl-C.
///
/// The first run starts immediately. Runs never overlap: a tick that fires
/// while a run is in progress is skipped.
pub async fn run(home: PathBuf, interval: Duration, job: Arc<Job>) -> Result<(), DaemonError> {
    let logs = logs_dir(&home);
    std::fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;

    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    tracing::info!(interval_secs = interval.as_secs(), "roster scheduler started");

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = scheduler_task(home, interval, job, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, stopping scheduler");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Scheduler(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (scheduler_result, rotation_result, signal_result) =
        tokio::join!(scheduler_handle, rotation_handle, signal_handle);

    handle_join("scheduler", scheduler_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn scheduler_task(
    home: PathBuf,
    interval: Duration,
    job: Arc<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let home = home.clone();
                let job = job.clone();
                let result = tokio::task::spawn_blocking(move || execute_once(&home, job.as_ref()))
                    .await
                    .map_err(|err| DaemonError::Scheduler(format!("run task join error: {err}")))?;
                if result.is_err() {
                    tracing::debug!("retrying on next tick");
                }
            }
        }
    }
    Ok(())
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(LOG_ROTATION_EVERY);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let home = home.clone();
                tokio::task::spawn_blocking(move || crate::log_rotation::rotate_logs(&home))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Scheduler(format!("{task} task join failure: {err}"))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the `fmt` subscriber (`RUST_LOG`, default `info`). Records from
/// the `log` facade used by the library crates are bridged in.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use roster_core::types::{ChangeDelta, SyncState};
    use roster_sync::{DocumentActivity, StalenessDecision};
    use tempfile::TempDir;

    fn quiet_outcome() -> RunOutcome {
        RunOutcome {
            decision: StalenessDecision {
                reasons: Vec::new(),
                delta: ChangeDelta::default(),
                token_reset: false,
                activity: DocumentActivity::Unknown,
                next_state: SyncState::default(),
            },
            write: None,
            document: None,
            issues: Vec::new(),
            last_updated: None,
            dry_run: false,
        }
    }

    fn counting_job(counter: Arc<AtomicUsize>) -> Arc<Job> {
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(quiet_outcome())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_runs_immediately_then_on_each_interval() {
        let home = TempDir::new().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let handle = tokio::spawn(scheduler_task(
            home.path().to_path_buf(),
            Duration::from_secs(60),
            counting_job(counter.clone()),
            shutdown_tx.subscribe(),
        ));

        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let runs = counter.load(Ordering::SeqCst);
        assert!((2..=3).contains(&runs), "expected 2-3 runs in 150s, got {runs}");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_does_not_stop_the_scheduler() {
        let home = TempDir::new().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let job: Arc<Job> = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Config("no identity".into()))
        });
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(scheduler_task(
            home.path().to_path_buf(),
            Duration::from_secs(10),
            job,
            shutdown_tx.subscribe(),
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 2);
        let last = read_last_run(home.path()).unwrap().expect("recorded");
        assert!(!last.ok);
        assert!(last.error.unwrap().contains("no identity"));
    }

    #[test]
    fn last_run_roundtrips_through_run_dir() {
        let home = TempDir::new().unwrap();
        assert_eq!(read_last_run(home.path()).unwrap(), None);

        let outcome = execute_once(home.path(), &|| Ok(quiet_outcome())).unwrap();
        assert!(!outcome.regenerated());
        let last = read_last_run(home.path()).unwrap().expect("recorded");
        assert!(last.ok);
        assert!(!last.regenerated);
        assert_eq!(last.write, None);
    }

    #[test]
    fn join_failure_maps_to_scheduler_error() {
        let ok = handle_join("scheduler", Ok(Ok(())));
        assert!(ok.is_ok());
        let inner = handle_join("scheduler", Ok(Err(DaemonError::Scheduler("boom".into()))));
        assert!(matches!(inner, Err(DaemonError::Scheduler(msg)) if msg == "boom"));
    }
}
