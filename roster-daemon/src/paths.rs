use std::path::{Path, PathBuf};

use roster_core::paths::roster_root;

pub const SCHEDULER_LABEL: &str = "dev.roster.scheduler";

pub const SCHEDULER_STDOUT_LOG: &str = "scheduler.log";
pub const SCHEDULER_STDERR_LOG: &str = "scheduler-err.log";
pub const LAST_RUN_FILE: &str = "last-run.json";

pub fn logs_dir(home: &Path) -> PathBuf {
    roster_root(home).join("logs")
}

pub fn run_dir(home: &Path) -> PathBuf {
    roster_root(home).join("run")
}

pub fn last_run_path(home: &Path) -> PathBuf {
    run_dir(home).join(LAST_RUN_FILE)
}

pub fn stdout_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(SCHEDULER_STDOUT_LOG)
}

pub fn stderr_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(SCHEDULER_STDERR_LOG)
}

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

pub fn launchd_plist_path(home: &Path) -> PathBuf {
    launch_agents_dir(home).join(format!("{SCHEDULER_LABEL}.plist"))
}
