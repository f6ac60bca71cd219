use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{io_err, DaemonError};
use crate::paths::{
    launch_agents_dir, launchd_plist_path, logs_dir, stderr_log_path, stdout_log_path,
    SCHEDULER_LABEL,
};

/// Generate a launchd plist that runs `roster run` every `interval_secs`.
///
/// launchd never starts a job while its previous instance is still running,
/// so runs stay serial.
pub fn generate_plist(binary_path: &Path, home: &Path, interval_secs: u64) -> String {
    let stdout = stdout_log_path(home).display().to_string();
    let stderr = stderr_log_path(home).display().to_string();
    let binary = binary_path.display().to_string();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
    <string>{binary}</string>
    <string>run</string>
  </array>
  <key>StartInterval</key>
  <integer>{interval}</integer>
  <key>RunAtLoad</key>
  <true/>
  <key>StandardOutPath</key>
  <string>{stdout}</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#,
        label = SCHEDULER_LABEL,
        binary = binary,
        interval = interval_secs.max(60),
        stdout = stdout,
        stderr = stderr
    )
}

/// Write the agent plist and bootstrap it for the current user.
pub fn install(home: &Path, binary_path: &Path, interval_secs: u64) -> Result<PathBuf, DaemonError> {
    ensure_macos()?;

    let launch_agents = launch_agents_dir(home);
    fs::create_dir_all(&launch_agents).map_err(|e| io_err(&launch_agents, e))?;
    let logs = logs_dir(home);
    fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;

    let plist = launchd_plist_path(home);
    fs::write(&plist, generate_plist(binary_path, home, interval_secs))
        .map_err(|e| io_err(&plist, e))?;

    let domain = launchctl_domain()?;
    let service = format!("{domain}/{SCHEDULER_LABEL}");

    let _ = run_launchctl(vec!["bootout".to_string(), service], true);
    run_launchctl(
        vec![
            "bootstrap".to_string(),
            domain,
            plist.display().to_string(),
        ],
        false,
    )?;

    Ok(plist)
}

/// Boot out the agent and remove its plist.
pub fn uninstall(home: &Path) -> Result<(), DaemonError> {
    ensure_macos()?;

    let plist = launchd_plist_path(home);
    if plist.exists() {
        let domain = launchctl_domain()?;
        let service = format!("{domain}/{SCHEDULER_LABEL}");
        let _ = run_launchctl(vec!["bootout".to_string(), service], true);
        fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn ensure_macos() -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn ensure_macos() -> Result<(), DaemonError> {
    Err(DaemonError::Launchd(
        "launchd management is only supported on macOS; use `roster schedule start` or cron"
            .to_string(),
    ))
}

fn run_launchctl(args: Vec<String>, ignore_failure: bool) -> Result<(), DaemonError> {
    let output = Command::new("launchctl")
        .args(args.iter().map(String::as_str))
        .output()
        .map_err(|e| io_err("launchctl", e))?;

    if output.status.success() || ignore_failure {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Err(DaemonError::Launchd(format!(
        "launchctl failed (status {}): {} {}",
        output.status, stdout, stderr
    )))
}

fn launchctl_domain() -> Result<String, DaemonError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| io_err("id -u", e))?;
    if !output.status.success() {
        return Err(DaemonError::Launchd(format!(
            "failed to resolve current uid (status {})",
            output.status
        )));
    }

    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if uid.is_empty() {
        return Err(DaemonError::Launchd(
            "current uid from `id -u` was empty".to_string(),
        ));
    }
    Ok(format!("gui/{uid}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::Value;

    #[test]
    fn plist_runs_roster_on_an_interval() {
        let binary = Path::new("/usr/local/bin/roster");
        let home = Path::new("/Users/piper");
        let plist = generate_plist(binary, home, 900);

        let value = Value::from_reader_xml(plist.as_bytes()).expect("parse plist");
        let dict = value.as_dictionary().expect("plist root dict");

        assert_eq!(
            dict.get("Label").and_then(Value::as_string),
            Some("dev.roster.scheduler")
        );
        assert_eq!(
            dict.get("StartInterval").and_then(Value::as_unsigned_integer),
            Some(900)
        );
        assert_eq!(dict.get("RunAtLoad").and_then(Value::as_boolean), Some(true));
        assert!(dict.get("KeepAlive").is_none(), "one-shot runs must not be respawned");
        assert_eq!(
            dict.get("StandardOutPath").and_then(Value::as_string),
            Some("/Users/piper/.roster/logs/scheduler.log")
        );

        let args: Vec<&str> = dict
            .get("ProgramArguments")
            .and_then(Value::as_array)
            .expect("ProgramArguments array")
            .iter()
            .map(|v| v.as_string().expect("program arg as string"))
            .collect();
        assert_eq!(args, vec!["/usr/local/bin/roster", "run"]);
    }

    #[test]
    fn interval_has_a_floor() {
        let plist = generate_plist(Path::new("/bin/roster"), Path::new("/h"), 5);
        let value = Value::from_reader_xml(plist.as_bytes()).expect("parse plist");
        let dict = value.as_dictionary().expect("dict");
        assert_eq!(
            dict.get("StartInterval").and_then(Value::as_unsigned_integer),
            Some(60)
        );
    }
}
