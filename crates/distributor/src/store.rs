//! Durable distributor state.
//!
//! The whole state (registered roots in registration order plus the settled
//! leaf set) is small enough to write out in full on every mutation. The file
//! store writes a sibling `.tmp`, fsyncs it, then renames over the target, so a
//! reader only ever sees a complete snapshot.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use dropcraft_core::{AssetId, Hash};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

/// One registered asset and its current root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRoot {
    pub asset: AssetId,
    pub root: Hash,
}

/// Persisted distributor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorSnapshot {
    pub version: u32,
    /// In first-registration order
    #[serde(default)]
    pub assets: Vec<AssetRoot>,
    /// Ascending
    #[serde(default)]
    pub settled: Vec<Hash>,
}

impl Default for DistributorSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            assets: Vec::new(),
            settled: Vec::new(),
        }
    }
}

/// Where the distributor keeps its state between runs.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<DistributorSnapshot>, StoreError>;

    /// Durably replace the stored state. When this returns `Ok`, a subsequent
    /// `load` (in this or a later process) sees `snapshot`.
    fn save(&self, snapshot: &DistributorSnapshot) -> Result<(), StoreError>;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<DistributorSnapshot>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let snapshot: DistributorSnapshot = serde_json::from_str(&contents)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.version));
        }
        debug!(
            "Loaded distributor state: {} assets, {} settled leaves from {}",
            snapshot.assets.len(),
            snapshot.settled.len(),
            self.path.display(),
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &DistributorSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        debug!(
            "Saved distributor state: {} assets, {} settled leaves to {}",
            snapshot.assets.len(),
            snapshot.settled.len(),
            self.path.display(),
        );
        Ok(())
    }
}

/// Flush the directory entry of a freshly renamed file, so the rename itself
/// survives power loss.
#[cfg(unix)]
pub fn sync_parent_dir(path: &Path) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub fn sync_parent_dir(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// Process-local store. Can be told to fail saves to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<DistributorSnapshot>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot, as if loaded from disk.
    pub fn with_snapshot(snapshot: DistributorSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make every following `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Last successfully saved snapshot
    pub fn snapshot(&self) -> Option<DistributorSnapshot> {
        self.snapshot.lock().expect("store lock poisoned").clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<DistributorSnapshot>, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, snapshot: &DistributorSnapshot) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated save failure",
            )));
        }
        *self.snapshot.lock().expect("store lock poisoned") = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
