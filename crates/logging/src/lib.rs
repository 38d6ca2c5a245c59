//! DropCraft Logging
//!
//! Shared `tracing-subscriber` setup for the DropCraft binaries.
//!
//! ## Usage
//!
//! ```no_run
//! use dropcraft_logging::{init, LogLevel};
//!
//! // From a `-v` count
//! init(LogLevel::from_verbosity(1));
//!
//! // Or from a settings string
//! let level: LogLevel = "warn".parse().unwrap_or_default();
//! # let _ = level;
//! ```
//!
//! `RUST_LOG` always wins over the level passed in.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Info, warnings, and errors (default)
    #[default]
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

impl LogLevel {
    /// `false` → `Info`, `true` → `Debug`
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Debug
        } else {
            Self::Info
        }
    }

    /// Create a log level from a verbosity count
    ///
    /// - `0` → `Info`
    /// - `1` → `Debug`
    /// - `2+` → `Trace`
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Apply a `-v` count on top of a configured level; never lowers it.
    pub fn raised_by(self, count: u8) -> Self {
        if count == 0 {
            self
        } else {
            self.max(Self::from_verbosity(count))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Initialize logging with the specified level
///
/// # Panics
///
/// Panics if a global subscriber is already set. Use `try_init` to handle that.
pub fn init(level: LogLevel) {
    try_init(level).expect("Failed to initialize logging");
}

/// Try to initialize logging, returning an error if already initialized
pub fn try_init(level: LogLevel) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(false)
        .try_init()
        .map_err(|e| e.to_string())
}

/// Like `try_init`, optionally printing the module target on each line
pub fn init_with_target(level: LogLevel, show_target: bool) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(show_target)
        .try_init()
        .map_err(|e| e.to_string())
}

/// Initialize logging for tests (captures output for test framework)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
