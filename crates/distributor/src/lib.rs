//! DropCraft Distributor
//!
//! Merkle-proof-gated, multi-asset rewards distribution.
//!
//! ## Claim Flow
//!
//! 1. **Fund**: tokens of each asset are moved into the distributor's custody
//!    account on the external [`AssetLedger`].
//! 2. **Publish**: the administrator publishes one Merkle root per asset with
//!    [`Distributor::set_root_for_asset`]. The first root for an asset appends it
//!    to the asset registry; later roots overwrite it in place.
//! 3. **Claim**: anyone presents `(asset, recipient, amount, proof)`. The leaf is
//!    recomputed, folded against the asset's current root, marked settled, and
//!    `amount` is transferred from custody to `recipient`.
//! 4. **Re-claim**: presenting an already-settled leaf again is a successful
//!    no-op ([`ClaimOutcome::AlreadySettled`]); nothing moves.
//!
//! All state sits behind one lock and every mutation is persisted through a
//! [`StateStore`] before funds move, so a leaf is never paid twice, across
//! concurrent callers or across restarts.

mod access;
mod claims;
mod engine;
mod ledger;
mod registry;
mod store;

pub use access::{AccessGuard, AdminCapability, Ownable, Ownership};
pub use claims::ClaimLedger;
pub use engine::{ClaimOutcome, Distributor};
pub use ledger::{AssetLedger, BalanceEntry, LedgerError, LedgerSnapshot, MemoryLedger};
pub use registry::RootRegistry;
pub use store::{
    sync_parent_dir, AssetRoot, DistributorSnapshot, JsonFileStore, MemoryStore, StateStore,
    StoreError, SNAPSHOT_VERSION,
};

pub use dropcraft_core::{compute_leaf, AccountId, Amount, AssetId, Hash};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributorError {
    #[error("Unauthorized account: {caller}")]
    Unauthorized { caller: AccountId },

    #[error("Invalid owner: {0}")]
    InvalidOwner(AccountId),

    #[error("Unknown asset: no root published for {0}")]
    UnknownAsset(AssetId),

    #[error("Invalid proof")]
    InvalidProof,

    #[error("Invalid root: the zero hash cannot be published")]
    InvalidRoot,

    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, DistributorError>;
