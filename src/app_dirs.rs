//! Centralized application directory paths for pomo.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Environment Overrides
//!
//! - `POMO_DATA_DIR` overrides [`data_dir`]
//! - `POMO_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the persisted session state and logs. Resolves to
/// `dirs::data_dir()/pomo/` unless `POMO_DATA_DIR` is set.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("POMO_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("pomo"))
        .unwrap_or_else(|| PathBuf::from("/tmp/pomo-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/pomo/` unless `POMO_CONFIG_DIR` is set.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("POMO_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("pomo"))
        .unwrap_or_else(|| PathBuf::from("/tmp/pomo-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default session persistence file (`data_dir()/session.json`).
#[must_use]
pub fn session_state_file() -> PathBuf {
    data_dir().join("session.json")
}

/// Default config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
