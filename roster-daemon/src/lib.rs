//! Roster scheduler: interval runtime, launchd agent and log rotation.

mod error;
pub mod launchd;
pub mod log_rotation;
pub mod paths;
mod runtime;

pub use error::DaemonError;
pub use launchd::{generate_plist, install as install_launchd, uninstall as uninstall_launchd};
pub use runtime::{
    execute_once, init_tracing, read_last_run, record_last_run, run, start_blocking, Job,
    RunSummary,
};
