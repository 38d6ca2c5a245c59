//! DropCraft Settings
//!
//! Configuration shared by the DropCraft tools.
//!
//! ## Features
//!
//! - Distributor settings (administrator, custody account, state files)
//! - Logging defaults
//! - Cross-platform config file storage
//! - JSON serialization
//!
//! ## Usage
//!
//! ```no_run
//! use dropcraft_settings::Settings;
//!
//! let mut settings = Settings::load_or_default()?;
//! settings.logging.level = "debug".to_string();
//! settings.save()?;
//! # Ok::<(), dropcraft_settings::SettingsError>(())
//! ```

mod config;
mod paths;

pub use config::{DistributorSettings, LoggingSettings, Settings, DEFAULT_CUSTODIAN};
pub use paths::{default_config_dir, default_data_dir, expand_path};

use std::path::PathBuf;

use dropcraft_core::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid address in `{field}`: {source}")]
    InvalidAddress {
        field: &'static str,
        #[source]
        source: ParseError,
    },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
