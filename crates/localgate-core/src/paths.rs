//! Path resolution for localgate data files.
//!
//! Resolution order for the data root:
//! 1. `LOCALGATE_DATA_DIR` environment variable
//! 2. System data directory (e.g. `~/.local/share/localgate`)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "LOCALGATE_DATA_DIR";

const APP_DIR_NAME: &str = "localgate";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Pick the data root from an explicit override or the platform default.
fn resolve_data_root(override_dir: Option<PathBuf>) -> Result<PathBuf, PathError> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    let base = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    Ok(base.join(APP_DIR_NAME))
}

/// Get the root directory for application data, creating it if needed.
pub fn data_root() -> Result<PathBuf, PathError> {
    let override_dir = env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let root = resolve_data_root(override_dir)?;
    ensure_dir(&root)?;
    tracing::debug!(path = %root.display(), "Resolved data root");
    Ok(root)
}

/// Location of the persisted settings file.
pub fn settings_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join(SETTINGS_FILE_NAME))
}

/// Settings file location inside an explicit directory.
#[must_use]
pub fn settings_path_in(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE_NAME)
}

fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
