//! Token custody.
//!
//! The distributor does not own balances; it asks an [`AssetLedger`] to move
//! funds out of its custody account. [`MemoryLedger`] is the in-process
//! implementation used by the CLI and tests, with a JSON-friendly snapshot.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use dropcraft_core::{AccountId, Amount, AssetId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient {asset} balance for {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        asset: AssetId,
        account: AccountId,
        needed: Amount,
        available: Amount,
    },

    #[error("Balance overflow")]
    Overflow,

    /// The backing store could not record the transfer; balances are unchanged
    #[error("Ledger write failed: {0}")]
    Persistence(String),
}

/// External fungible-token ledger holding the distributor's funds.
pub trait AssetLedger: Send + Sync {
    /// Account whose balances back payouts
    fn custody_account(&self) -> AccountId;

    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount;

    /// Move `amount` of `asset` from custody to `to`. Either the whole amount
    /// moves or nothing does.
    fn transfer(&self, asset: &AssetId, to: &AccountId, amount: Amount) -> Result<(), LedgerError>;
}

/// One non-zero balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub asset: AssetId,
    pub account: AccountId,
    pub amount: Amount,
}

/// Serializable ledger contents, balances sorted by (asset, account)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub custody: AccountId,
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
}

/// In-memory multi-asset ledger.
pub struct MemoryLedger {
    custody: AccountId,
    balances: RwLock<HashMap<(AssetId, AccountId), Amount>>,
}

impl MemoryLedger {
    pub fn new(custody: AccountId) -> Self {
        Self {
            custody,
            balances: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a ledger from a snapshot. Repeated entries are summed.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Result<Self, LedgerError> {
        let mut balances: HashMap<(AssetId, AccountId), Amount> = HashMap::new();
        for entry in &snapshot.balances {
            let slot = balances.entry((entry.asset, entry.account)).or_insert(0);
            *slot = slot.checked_add(entry.amount).ok_or(LedgerError::Overflow)?;
        }
        Ok(Self {
            custody: snapshot.custody,
            balances: RwLock::new(balances),
        })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let balances = self.balances.read().expect("ledger lock poisoned");
        let mut entries: Vec<BalanceEntry> = balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|((asset, account), amount)| BalanceEntry {
                asset: *asset,
                account: *account,
                amount: *amount,
            })
            .collect();
        entries.sort_by(|a, b| (a.asset, a.account).cmp(&(b.asset, b.account)));
        LedgerSnapshot {
            custody: self.custody,
            balances: entries,
        }
    }

    /// Create `amount` new units of `asset` in `account`.
    pub fn mint(&self, asset: &AssetId, account: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        let mut balances = self.balances.write().expect("ledger lock poisoned");
        let slot = balances.entry((*asset, *account)).or_insert(0);
        *slot = slot.checked_add(amount).ok_or(LedgerError::Overflow)?;
        info!("Minted {} of {} to {}", amount, asset.short(), account.short());
        Ok(())
    }

    /// Destroy `amount` of `asset` held by `account`.
    pub fn burn(&self, asset: &AssetId, account: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        let mut balances = self.balances.write().expect("ledger lock poisoned");
        let available = balances.get(&(*asset, *account)).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: *asset,
                account: *account,
                needed: amount,
                available,
            });
        }
        balances.insert((*asset, *account), available - amount);
        info!("Burned {} of {} from {}", amount, asset.short(), account.short());
        Ok(())
    }

    /// Move funds between any two accounts.
    pub fn transfer_from(
        &self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut balances = self.balances.write().expect("ledger lock poisoned");

        let available = balances.get(&(*asset, *from)).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: *asset,
                account: *from,
                needed: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }

        let current_to = balances.get(&(*asset, *to)).copied().unwrap_or(0);
        let new_to = current_to.checked_add(amount).ok_or(LedgerError::Overflow)?;

        balances.insert((*asset, *from), available - amount);
        balances.insert((*asset, *to), new_to);

        debug!(
            "Transferred {} of {}: {} -> {}",
            amount,
            asset.short(),
            from.short(),
            to.short()
        );
        Ok(())
    }
}

impl AssetLedger for MemoryLedger {
    fn custody_account(&self) -> AccountId {
        self.custody
    }

    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        let balances = self.balances.read().expect("ledger lock poisoned");
        balances.get(&(*asset, *account)).copied().unwrap_or(0)
    }

    fn transfer(&self, asset: &AssetId, to: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.transfer_from(asset, &self.custody, to, amount)
    }
}
