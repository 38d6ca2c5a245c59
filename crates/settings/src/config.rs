//! Configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use dropcraft_core::Address;

use crate::{default_data_dir, default_settings_path, expand_path, Result, SettingsError};

/// Custody account used when none is configured
pub const DEFAULT_CUSTODIAN: &str = "0x000000000000000000000000000000000000d157";

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub distributor: DistributorSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            info!("Loaded settings from {:?}", path);
            settings
        } else {
            Self::default()
        };
        settings.config_path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Save settings to the path they were loaded from
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Distributor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorSettings {
    /// Administrator address (hex). Unset until `init` runs.
    #[serde(default)]
    pub administrator: Option<String>,

    /// Custody account (hex) that holds funds awaiting claims
    #[serde(default = "default_custodian")]
    pub custodian: String,

    /// Distributor state file; defaults to `<data dir>/state.json`
    #[serde(default)]
    pub state_file: Option<String>,

    /// Local ledger file; defaults to `<data dir>/ledger.json`
    #[serde(default)]
    pub ledger_file: Option<String>,
}

fn default_custodian() -> String {
    DEFAULT_CUSTODIAN.to_string()
}

impl Default for DistributorSettings {
    fn default() -> Self {
        Self {
            administrator: None,
            custodian: default_custodian(),
            state_file: None,
            ledger_file: None,
        }
    }
}

impl DistributorSettings {
    pub fn administrator_address(&self) -> Result<Option<Address>> {
        self.administrator
            .as_deref()
            .map(|s| parse_address("distributor.administrator", s))
            .transpose()
    }

    pub fn custodian_address(&self) -> Result<Address> {
        parse_address("distributor.custodian", &self.custodian)
    }

    pub fn state_path(&self) -> PathBuf {
        resolve_path(self.state_file.as_deref(), "state.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        resolve_path(self.ledger_file.as_deref(), "ledger.json")
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|source| SettingsError::InvalidAddress { field, source })
}

fn resolve_path(configured: Option<&str>, default_name: &str) -> PathBuf {
    match configured {
        Some(path) => expand_path(Path::new(path)),
        None => default_data_dir().join(default_name),
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `error`, `warn`, `info`, `debug` or `trace`
    #[serde(default = "default_level")]
    pub level: String,

    /// Print the module path on each log line
    #[serde(default)]
    pub show_target: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            show_target: false,
        }
    }
}
