//! Platform directories

use std::path::{Path, PathBuf};

const APP_DIR: &str = "dropcraft";
#[cfg(any(target_os = "macos", target_os = "windows"))]
const APP_DIR_TITLE: &str = "DropCraft";

/// Replace a leading `~` with the user's home directory
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

/// Linux: `$XDG_CONFIG_HOME/dropcraft` or `~/.config/dropcraft`
pub fn default_config_dir() -> PathBuf {
    platform_dir("XDG_CONFIG_HOME", ".config")
}

/// Linux: `$XDG_DATA_HOME/dropcraft` or `~/.local/share/dropcraft`
///
/// Distributor state and the local ledger live here.
pub fn default_data_dir() -> PathBuf {
    platform_dir("XDG_DATA_HOME", ".local/share")
}

#[cfg(target_os = "linux")]
fn platform_dir(xdg_var: &str, home_fallback: &str) -> PathBuf {
    std::env::var(xdg_var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            home_dir()
                .map(|h| h.join(home_fallback))
                .unwrap_or_else(|| PathBuf::from("."))
        })
        .join(APP_DIR)
}

#[cfg(target_os = "macos")]
fn platform_dir(_xdg_var: &str, _home_fallback: &str) -> PathBuf {
    home_dir()
        .map(|h| h.join("Library/Application Support").join(APP_DIR_TITLE))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
}

#[cfg(target_os = "windows")]
fn platform_dir(_xdg_var: &str, _home_fallback: &str) -> PathBuf {
    std::env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(APP_DIR_TITLE)
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn platform_dir(_xdg_var: &str, _home_fallback: &str) -> PathBuf {
    home_dir()
        .map(|h| h.join(format!(".{}", APP_DIR)))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_no_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path), path);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        if home_dir().is_none() {
            return;
        }
        let expanded = expand_path(&PathBuf::from("~/drops/state.json"));
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("drops/state.json"));
    }

    #[test]
    fn test_default_dirs_are_app_scoped() {
        for dir in [default_config_dir(), default_data_dir()] {
            assert!(dir.to_string_lossy().to_lowercase().contains("dropcraft"));
        }
    }
}
