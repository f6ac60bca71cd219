//! On-disk layout and the shared atomic-save helper.
//!
//! ```text
//! ~/.roster/
//!   config.yaml        (policy + collaborator selection)
//!   properties.yaml    (sync token, last update, group ids; mode 0600)
//!   roster.md          (default render target)
//!   templates/         (optional `*.tera` overrides)
//!   logs/              (scheduler logs)
//! ```
//!
//! Every function takes an explicit `home` so tests can root the layout in a
//! `TempDir`. [`home`] resolves the real one via `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};

pub const ROSTER_DIR: &str = ".roster";
pub const CONFIG_FILE: &str = "config.yaml";
pub const PROPERTIES_FILE: &str = "properties.yaml";
pub const DEFAULT_DOCUMENT: &str = "roster.md";
pub const TEMPLATES_DIR: &str = "templates";

/// Resolve the current user's home directory.
pub fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

/// `<home>/.roster/`
pub fn roster_root(home: &Path) -> PathBuf {
    home.join(ROSTER_DIR)
}

/// `<home>/.roster/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    roster_root(home).join(CONFIG_FILE)
}

/// `<home>/.roster/properties.yaml`
pub fn properties_path_at(home: &Path) -> PathBuf {
    roster_root(home).join(PROPERTIES_FILE)
}

/// `<home>/.roster/templates/`
pub fn templates_dir_at(home: &Path) -> PathBuf {
    roster_root(home).join(TEMPLATES_DIR)
}

/// Create `<home>/.roster/` (mode `0700`) if it does not yet exist.
pub fn ensure_root_at(home: &Path) -> Result<PathBuf, CoreError> {
    let dir = roster_root(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// Write `contents` to `path` atomically.
///
/// Write flow: `<name>.tmp` sibling → `chmod 0600` → `rename`. The temp file
/// lives in the target's directory so the rename never crosses filesystems.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), CoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("path has no parent directory")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}
