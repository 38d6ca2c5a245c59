//! Local mode: a file-backed distributor and ledger under the data directory.
//!
//! A [`LocalNode`] holds an exclusive lock file in every directory it writes
//! to, so two `dropcraft` processes never interleave their state and ledger
//! writes. The ledger is written through on every change: a payout is on
//! disk before `transfer` reports success.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use dropcraft_core::{AccountId, Amount, AssetId};
use dropcraft_distributor::{
    sync_parent_dir, AssetLedger, Distributor, JsonFileStore, LedgerError, LedgerSnapshot,
    MemoryLedger, Ownable,
};
use dropcraft_settings::Settings;

const LOCK_FILE: &str = "dropcraft.lock";

pub struct LocalNode {
    pub distributor: Distributor,
    pub ledger: Arc<FileLedger>,
    // Dropped last, after the distributor and ledger
    _locks: Vec<DirLock>,
}

impl LocalNode {
    pub fn open(settings: &Settings) -> Result<Self> {
        let administrator = settings
            .distributor
            .administrator_address()?
            .context("No administrator configured; run `dropcraft init --admin <address>` first")?;
        let custodian = settings.distributor.custodian_address()?;

        let state_path = settings.distributor.state_path();
        let ledger_path = settings.distributor.ledger_path();

        let mut dirs = vec![data_dir(&state_path), data_dir(&ledger_path)];
        dirs.sort();
        dirs.dedup();
        let locks = dirs
            .iter()
            .map(|dir| DirLock::acquire(dir))
            .collect::<Result<Vec<_>>>()?;

        let ledger = Arc::new(FileLedger::open(&ledger_path, custodian)?);
        let distributor = Distributor::new(
            Arc::new(Ownable::new(administrator)),
            ledger.clone(),
            Box::new(JsonFileStore::new(&state_path)),
        )
        .with_context(|| format!("Failed to open distributor state {:?}", state_path))?;

        Ok(Self {
            distributor,
            ledger,
            _locks: locks,
        })
    }
}

fn data_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Exclusive claim on a data directory, released on drop.
struct DirLock {
    path: PathBuf,
    _file: File,
}

impl DirLock {
    fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => bail!(
                "Data directory {:?} is in use by another dropcraft process \
                 (remove {:?} if none is running)",
                dir,
                path
            ),
            Err(e) => {
                return Err(anyhow!(e).context(format!("Failed to create lock file {:?}", path)))
            }
        };
        writeln!(file, "{}", std::process::id())
            .with_context(|| format!("Failed to write lock file {:?}", path))?;

        debug!("Acquired {:?}", path);
        Ok(Self { path, _file: file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {:?}: {}", self.path, e);
        }
    }
}

/// [`MemoryLedger`] persisted to a JSON file after every change.
///
/// A change that cannot be written is undone in memory and reported as
/// [`LedgerError::Persistence`].
pub struct FileLedger {
    inner: MemoryLedger,
    path: PathBuf,
    // Serializes change-then-write so snapshots never interleave
    write: Mutex<()>,
}

impl FileLedger {
    pub fn new(inner: MemoryLedger, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    /// Load the ledger at `path`, or start an empty one owned by `custodian`.
    pub fn open(path: &Path, custodian: AccountId) -> Result<Self> {
        if !path.exists() {
            debug!("No ledger at {:?}, starting empty", path);
            return Ok(Self::new(MemoryLedger::new(custodian), path));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger {:?}", path))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ledger {:?}", path))?;
        if snapshot.custody != custodian {
            warn!(
                "Ledger custody account {} differs from configured custodian {}; using the ledger's",
                snapshot.custody, custodian
            );
        }
        Ok(Self::new(MemoryLedger::from_snapshot(&snapshot)?, path))
    }

    /// Mint into `account` and write the ledger.
    pub fn mint(&self, asset: &AssetId, account: &AccountId, amount: Amount) -> Result<()> {
        let _write = self.write.lock().expect("ledger file lock poisoned");
        self.inner.mint(asset, account, amount)?;
        if let Err(e) = self.save() {
            if let Err(undo) = self.inner.burn(asset, account, amount) {
                warn!("Failed to undo unsaved mint of {}: {}", asset.short(), undo);
            }
            return Err(e);
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let dir = data_dir(&self.path);
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;

        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create ledger tmp file {:?}", tmp_path))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("Failed to write ledger tmp file {:?}", tmp_path))?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to rename {:?} -> {:?}", tmp_path, self.path))?;
        sync_parent_dir(&self.path)?;

        debug!("Saved ledger to {:?}", self.path);
        Ok(())
    }
}

impl AssetLedger for FileLedger {
    fn custody_account(&self) -> AccountId {
        self.inner.custody_account()
    }

    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.inner.balance_of(asset, account)
    }

    fn transfer(&self, asset: &AssetId, to: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        let _write = self.write.lock().expect("ledger file lock poisoned");
        let custody = self.inner.custody_account();
        self.inner.transfer_from(asset, &custody, to, amount)?;

        if let Err(e) = self.save() {
            if let Err(undo) = self.inner.transfer_from(asset, to, &custody, amount) {
                warn!("Failed to undo unsaved transfer of {}: {}", asset.short(), undo);
            }
            return Err(LedgerError::Persistence(format!("{:#}", e)));
        }
        Ok(())
    }
}
