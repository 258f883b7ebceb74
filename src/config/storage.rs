//! Settings file lookup and loading
//!
//! Default location: ~/.cpbcheck/settings.json on macOS/Linux,
//! %APPDATA%\cpbcheck\settings.json on Windows. The tool never writes the
//! file; one that does not parse is moved aside and defaults are used.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, error, warn};

use super::types::{Settings, SETTINGS_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings version {found} is newer than supported {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Get the cpbcheck configuration directory
pub fn config_dir() -> Result<PathBuf, StorageError> {
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("cpbcheck"));
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".cpbcheck"))
        .ok_or(StorageError::NoConfigDir)
}

/// Diagnostics log directory
pub fn log_dir() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("logs"))
}

pub fn default_settings_path() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("settings.json"))
}

/// Read settings from `path`.
///
/// A missing file yields defaults. A file that is not valid JSON for
/// [`Settings`] is renamed to `settings.json.corrupt.<timestamp>` and
/// defaults are used. A file that parses but holds unusable values is an
/// error, since the user wrote it on purpose.
pub async fn load_settings(path: &Path) -> Result<Settings, StorageError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Settings::default());
        }
        Err(e) => return Err(e.into()),
    };

    let settings = match serde_json::from_str::<Settings>(&contents) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Settings file {:?} unreadable: {}", path, e);
            match set_aside(path).await {
                Ok(moved) => warn!("Moved it to {:?}, using defaults", moved),
                Err(move_err) => error!("Failed to move unreadable settings: {}", move_err),
            }
            return Ok(Settings::default());
        }
    };

    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), StorageError> {
    if settings.version > SETTINGS_VERSION {
        return Err(StorageError::VersionTooNew {
            found: settings.version,
            supported: SETTINGS_VERSION,
        });
    }

    let timeouts = [
        ("ftp_dial_timeout_secs", settings.ftp_dial_timeout_secs),
        ("ssh_timeout_secs", settings.ssh_timeout_secs),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            return Err(StorageError::Invalid {
                field,
                reason: "must be at least one second".to_string(),
            });
        }
    }

    if settings.partial_suffix.is_empty() {
        return Err(StorageError::Invalid {
            field: "partial_suffix",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Rename `path` out of the way so the next start does not trip on it again.
async fn set_aside(path: &Path) -> Result<PathBuf, StorageError> {
    let moved = path.with_extension(format!(
        "json.corrupt.{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ));
    fs::rename(path, &moved).await?;
    Ok(moved)
}
