//! The distributor: root publication and proof-gated claims.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use dropcraft_core::{compute_leaf, AccountId, Amount, AssetId, Hash};
use dropcraft_merkle::verify;

use crate::access::{AccessGuard, Ownership};
use crate::claims::ClaimLedger;
use crate::ledger::AssetLedger;
use crate::registry::RootRegistry;
use crate::store::{DistributorSnapshot, MemoryStore, StateStore, StoreError, SNAPSHOT_VERSION};
use crate::{DistributorError, Result};

/// Result of a successful `claim` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The leaf was settled by this call and `amount` was paid out
    Settled { leaf: Hash, amount: Amount },
    /// The leaf had been settled before; nothing moved
    AlreadySettled { leaf: Hash },
}

impl ClaimOutcome {
    pub fn leaf(&self) -> Hash {
        match self {
            ClaimOutcome::Settled { leaf, .. } | ClaimOutcome::AlreadySettled { leaf } => *leaf,
        }
    }

    /// Amount transferred by this call
    pub fn paid(&self) -> Amount {
        match self {
            ClaimOutcome::Settled { amount, .. } => *amount,
            ClaimOutcome::AlreadySettled { .. } => 0,
        }
    }
}

#[derive(Debug, Default)]
struct DistributorState {
    roots: RootRegistry,
    claims: ClaimLedger,
}

impl DistributorState {
    fn snapshot(&self) -> DistributorSnapshot {
        DistributorSnapshot {
            version: SNAPSHOT_VERSION,
            assets: self.roots.entries(),
            settled: self.claims.sorted_leaves(),
        }
    }

    fn from_snapshot(snapshot: &DistributorSnapshot) -> std::result::Result<Self, StoreError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.version));
        }
        Ok(Self {
            roots: RootRegistry::from_entries(&snapshot.assets)?,
            claims: ClaimLedger::from_leaves(&snapshot.settled),
        })
    }
}

/// Multi-asset Merkle distributor.
///
/// Claims and root updates take the same write lock, so they are serialized:
/// a claim verifies against exactly one root, and two claims of the same leaf
/// cannot both pay. The settled mark is persisted before funds move.
pub struct Distributor {
    guard: AccessGuard,
    ledger: Arc<dyn AssetLedger>,
    store: Box<dyn StateStore>,
    state: RwLock<DistributorState>,
}

impl Distributor {
    /// Open a distributor, restoring whatever `store` holds.
    pub fn new(
        ownership: Arc<dyn Ownership>,
        ledger: Arc<dyn AssetLedger>,
        store: Box<dyn StateStore>,
    ) -> Result<Self> {
        let state = match store.load()? {
            Some(snapshot) => {
                let state = DistributorState::from_snapshot(&snapshot)?;
                info!(
                    "Restored distributor state: {} assets, {} settled leaves",
                    state.roots.len(),
                    state.claims.settled_count()
                );
                state
            }
            None => DistributorState::default(),
        };

        Ok(Self {
            guard: AccessGuard::new(ownership),
            ledger,
            store,
            state: RwLock::new(state),
        })
    }

    /// Distributor with no durable state, for tests and dry runs.
    pub fn in_memory(ownership: Arc<dyn Ownership>, ledger: Arc<dyn AssetLedger>) -> Self {
        Self {
            guard: AccessGuard::new(ownership),
            ledger,
            store: Box::new(MemoryStore::new()),
            state: RwLock::new(DistributorState::default()),
        }
    }

    // ==================== Administration ====================

    /// Publish `root` for `asset`. Administrator only.
    ///
    /// The first root for an asset appends it to the registry; later calls
    /// replace the root in place. Claims settled under an earlier root stay
    /// settled.
    pub fn set_root_for_asset(&self, caller: &AccountId, asset: AssetId, root: Hash) -> Result<()> {
        let mut state = self.state.write().expect("distributor lock poisoned");
        let cap = self.guard.authorize(caller)?;

        let mut roots = state.roots.clone();
        let newly_registered = roots.set_root(&cap, asset, root)?;

        let snapshot = DistributorSnapshot {
            version: SNAPSHOT_VERSION,
            assets: roots.entries(),
            settled: state.claims.sorted_leaves(),
        };
        self.store.save(&snapshot)?;
        state.roots = roots;

        if newly_registered {
            info!("Registered asset {} with root {}", asset.short(), root.short());
        } else {
            info!("Updated root for asset {}: {}", asset.short(), root.short());
        }
        Ok(())
    }

    pub fn administrator(&self) -> AccountId {
        self.guard.administrator()
    }

    // ==================== Claims ====================

    /// Settle `recipient`'s entitlement of `amount` of `asset`.
    ///
    /// Anyone may submit a claim on the recipient's behalf; funds always go
    /// to `recipient`. Re-submitting a settled leaf returns
    /// [`ClaimOutcome::AlreadySettled`] without moving funds.
    pub fn claim(
        &self,
        asset: &AssetId,
        recipient: &AccountId,
        amount: Amount,
        proof: &[Hash],
    ) -> Result<ClaimOutcome> {
        let leaf = compute_leaf(asset, recipient, amount);

        let mut state = self.state.write().expect("distributor lock poisoned");
        Self::verify_leaf(&state, asset, &leaf, proof)?;

        if !state.claims.try_settle(leaf) {
            debug!("Leaf {} already settled, skipping", leaf.short());
            return Ok(ClaimOutcome::AlreadySettled { leaf });
        }

        if let Err(e) = self.store.save(&state.snapshot()) {
            state.claims.revert(&leaf);
            warn!("Failed to persist claim {}: {}", leaf.short(), e);
            return Err(e.into());
        }

        if let Err(e) = self.ledger.transfer(asset, recipient, amount) {
            state.claims.revert(&leaf);
            if let Err(store_err) = self.store.save(&state.snapshot()) {
                // The stored mark stays; the leaf reads as settled after restart
                warn!(
                    "Failed to persist rollback of claim {}: {}",
                    leaf.short(),
                    store_err
                );
            }
            warn!("Transfer for claim {} failed: {}", leaf.short(), e);
            return Err(DistributorError::TransferFailed(e));
        }

        info!(
            "Claim settled: {} of {} to {} (leaf {})",
            amount,
            asset.short(),
            recipient.short(),
            leaf.short()
        );
        Ok(ClaimOutcome::Settled { leaf, amount })
    }

    /// Check a claim without settling it. Returns the leaf on success.
    pub fn check_claim(
        &self,
        asset: &AssetId,
        recipient: &AccountId,
        amount: Amount,
        proof: &[Hash],
    ) -> Result<Hash> {
        let leaf = compute_leaf(asset, recipient, amount);
        let state = self.state.read().expect("distributor lock poisoned");
        Self::verify_leaf(&state, asset, &leaf, proof)?;
        Ok(leaf)
    }

    fn verify_leaf(state: &DistributorState, asset: &AssetId, leaf: &Hash, proof: &[Hash]) -> Result<()> {
        if !state.roots.has_root(asset) {
            warn!("Claim rejected: no root published for {}", asset.short());
            return Err(DistributorError::UnknownAsset(*asset));
        }
        let root = state.roots.current_root(asset);
        if !verify(leaf, proof, &root) {
            warn!("Claim rejected: proof for leaf {} does not reach root {}", leaf.short(), root.short());
            return Err(DistributorError::InvalidProof);
        }
        Ok(())
    }

    // ==================== Queries ====================

    /// Current root for `asset`, `Hash::ZERO` if unregistered.
    pub fn root_for_asset(&self, asset: &AssetId) -> Hash {
        let state = self.state.read().expect("distributor lock poisoned");
        state.roots.current_root(asset)
    }

    /// Registered assets, in first-registration order.
    pub fn registered_assets(&self) -> Vec<AssetId> {
        let state = self.state.read().expect("distributor lock poisoned");
        state.roots.list_assets().to_vec()
    }

    /// The leaf a claim for `(asset, recipient, amount)` would settle.
    pub fn compute_leaf(asset: &AssetId, recipient: &AccountId, amount: Amount) -> Hash {
        compute_leaf(asset, recipient, amount)
    }

    pub fn is_claimed(&self, asset: &AssetId, recipient: &AccountId, amount: Amount) -> bool {
        self.is_leaf_settled(&compute_leaf(asset, recipient, amount))
    }

    pub fn is_leaf_settled(&self, leaf: &Hash) -> bool {
        let state = self.state.read().expect("distributor lock poisoned");
        state.claims.is_settled(leaf)
    }

    pub fn settled_count(&self) -> usize {
        let state = self.state.read().expect("distributor lock poisoned");
        state.claims.settled_count()
    }

    /// Custody balance of `asset` on the backing ledger
    pub fn custody_balance(&self, asset: &AssetId) -> Amount {
        self.ledger.balance_of(asset, &self.ledger.custody_account())
    }

    /// Current state in persisted form
    pub fn snapshot(&self) -> DistributorSnapshot {
        let state = self.state.read().expect("distributor lock poisoned");
        state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{OnceLock, Weak};

    use super::*;
    use crate::access::Ownable;
    use crate::ledger::MemoryLedger;
    use crate::store::AssetRoot;
    use dropcraft_core::Address;
    use dropcraft_merkle::MerkleTree;

    fn admin() -> AccountId {
        Address::repeat(0xAD)
    }

    fn custody() -> AccountId {
        Address::repeat(0xC0)
    }

    fn token() -> AssetId {
        Address::repeat(0x70)
    }

    fn alice() -> AccountId {
        Address::repeat(0x01)
    }

    fn bob() -> AccountId {
        Address::repeat(0x02)
    }

    /// Ledger funded with 100_000 of `token()`, plus a tree for alice:40_000 and bob:60_000.
    fn setup() -> (Distributor, Arc<MemoryLedger>, MerkleTree) {
        dropcraft_logging::init_test();
        let ledger = Arc::new(MemoryLedger::new(custody()));
        ledger.mint(&token(), &custody(), 100_000).unwrap();
        let distributor = Distributor::in_memory(Arc::new(Ownable::new(admin())), ledger.clone());

        let tree = MerkleTree::from_leaves(vec![
            compute_leaf(&token(), &alice(), 40_000),
            compute_leaf(&token(), &bob(), 60_000),
        ]);
        distributor.set_root_for_asset(&admin(), token(), tree.root()).unwrap();
        (distributor, ledger, tree)
    }

    #[test]
    fn test_claim_pays_recipient() {
        let (distributor, ledger, tree) = setup();
        let proof = tree.proof(0).unwrap().siblings;

        let outcome = distributor.claim(&token(), &alice(), 40_000, &proof).unwrap();

        assert_eq!(
            outcome,
            ClaimOutcome::Settled {
                leaf: compute_leaf(&token(), &alice(), 40_000),
                amount: 40_000
            }
        );
        assert_eq!(ledger.balance_of(&token(), &alice()), 40_000);
        assert_eq!(distributor.custody_balance(&token()), 60_000);
        assert!(distributor.is_claimed(&token(), &alice(), 40_000));
        assert!(!distributor.is_claimed(&token(), &bob(), 60_000));
    }

    #[test]
    fn test_reclaim_is_noop() {
        let (distributor, ledger, tree) = setup();
        let proof = tree.proof(0).unwrap().siblings;

        distributor.claim(&token(), &alice(), 40_000, &proof).unwrap();
        let again = distributor.claim(&token(), &alice(), 40_000, &proof).unwrap();

        assert!(matches!(again, ClaimOutcome::AlreadySettled { .. }));
        assert_eq!(again.paid(), 0);
        assert_eq!(ledger.balance_of(&token(), &alice()), 40_000);
        assert_eq!(distributor.settled_count(), 1);
    }

    #[test]
    fn test_claim_unknown_asset() {
        let (distributor, _ledger, tree) = setup();
        let other = Address::repeat(0x71);
        let proof = tree.proof(0).unwrap().siblings;

        let result = distributor.claim(&other, &alice(), 40_000, &proof);
        assert!(matches!(result, Err(DistributorError::UnknownAsset(a)) if a == other));
    }

    #[test]
    fn test_claim_wrong_amount_rejected() {
        let (distributor, ledger, tree) = setup();
        let proof = tree.proof(0).unwrap().siblings;

        let result = distributor.claim(&token(), &alice(), 40_001, &proof);
        assert!(matches!(result, Err(DistributorError::InvalidProof)));
        assert_eq!(ledger.balance_of(&token(), &alice()), 0);
        assert_eq!(distributor.settled_count(), 0);
    }

    #[test]
    fn test_claim_by_anyone_pays_recipient() {
        // Proof of bob's line used for alice's address fails
        let (distributor, _ledger, tree) = setup();
        let bob_proof = tree.proof(1).unwrap().siblings;
        assert!(matches!(
            distributor.claim(&token(), &alice(), 60_000, &bob_proof),
            Err(DistributorError::InvalidProof)
        ));
    }

    #[test]
    fn test_transfer_failure_reverts_settlement() {
        let ledger = Arc::new(MemoryLedger::new(custody()));
        ledger.mint(&token(), &custody(), 10_000).unwrap();
        let distributor = Distributor::in_memory(Arc::new(Ownable::new(admin())), ledger.clone());
        let tree = MerkleTree::from_leaves(vec![
            compute_leaf(&token(), &alice(), 40_000),
            compute_leaf(&token(), &bob(), 60_000),
        ]);
        distributor.set_root_for_asset(&admin(), token(), tree.root()).unwrap();
        let proof = tree.proof(0).unwrap().siblings;

        let result = distributor.claim(&token(), &alice(), 40_000, &proof);
        assert!(matches!(result, Err(DistributorError::TransferFailed(_))));
        assert!(!distributor.is_claimed(&token(), &alice(), 40_000));

        // Funding the shortfall makes the same claim succeed
        ledger.mint(&token(), &custody(), 30_000).unwrap();
        let outcome = distributor.claim(&token(), &alice(), 40_000, &proof).unwrap();
        assert_eq!(outcome.paid(), 40_000);
    }

    #[test]
    fn test_storage_failure_blocks_payout() {
        let ledger = Arc::new(MemoryLedger::new(custody()));
        ledger.mint(&token(), &custody(), 100_000).unwrap();
        let store = Arc::new(MemoryStore::new());

        struct SharedStore(Arc<MemoryStore>);
        impl StateStore for SharedStore {
            fn load(&self) -> std::result::Result<Option<DistributorSnapshot>, StoreError> {
                self.0.load()
            }
            fn save(&self, snapshot: &DistributorSnapshot) -> std::result::Result<(), StoreError> {
                self.0.save(snapshot)
            }
        }

        let distributor = Distributor::new(
            Arc::new(Ownable::new(admin())),
            ledger.clone(),
            Box::new(SharedStore(store.clone())),
        )
        .unwrap();
        let tree = MerkleTree::from_leaves(vec![compute_leaf(&token(), &alice(), 5)]);
        distributor.set_root_for_asset(&admin(), token(), tree.root()).unwrap();

        store.set_fail_saves(true);
        let result = distributor.claim(&token(), &alice(), 5, &[]);
        assert!(matches!(result, Err(DistributorError::Storage(_))));
        assert_eq!(ledger.balance_of(&token(), &alice()), 0);
        assert!(!distributor.is_claimed(&token(), &alice(), 5));

        // Root update is not applied either
        let result = distributor.set_root_for_asset(&admin(), token(), Hash::new([9; 32]));
        assert!(matches!(result, Err(DistributorError::Storage(_))));
        assert_eq!(distributor.root_for_asset(&token()), tree.root());
    }

    #[test]
    fn test_set_root_requires_admin() {
        let (distributor, _ledger, _tree) = setup();
        let result = distributor.set_root_for_asset(&alice(), token(), Hash::new([5; 32]));
        assert!(matches!(result, Err(DistributorError::Unauthorized { caller }) if caller == alice()));
        assert_ne!(distributor.root_for_asset(&token()), Hash::new([5; 32]));
    }

    /// Ownership that records whether the distributor's state lock was held
    /// while the administrator was looked up.
    struct LockCheckingOwnership {
        owner: AccountId,
        distributor: OnceLock<Weak<Distributor>>,
        checked_under_lock: AtomicBool,
    }

    impl Ownership for LockCheckingOwnership {
        fn current_administrator(&self) -> AccountId {
            if let Some(distributor) = self.distributor.get().and_then(Weak::upgrade) {
                let held = distributor.state.try_read().is_err();
                self.checked_under_lock.store(held, Ordering::SeqCst);
            }
            self.owner
        }
    }

    #[test]
    fn test_set_root_authorizes_under_state_lock() {
        let ledger = Arc::new(MemoryLedger::new(custody()));
        let ownership = Arc::new(LockCheckingOwnership {
            owner: admin(),
            distributor: OnceLock::new(),
            checked_under_lock: AtomicBool::new(false),
        });
        let distributor = Arc::new(Distributor::in_memory(ownership.clone(), ledger));
        ownership.distributor.set(Arc::downgrade(&distributor)).unwrap();

        distributor.set_root_for_asset(&admin(), token(), Hash::new([4; 32])).unwrap();
        assert!(ownership.checked_under_lock.load(Ordering::SeqCst));
    }

    #[test]
    fn test_set_root_follows_ownership_handover() {
        let ledger = Arc::new(MemoryLedger::new(custody()));
        let ownable = Arc::new(Ownable::new(admin()));
        let distributor = Distributor::in_memory(ownable.clone(), ledger);

        ownable.transfer_ownership(&admin(), alice()).unwrap();

        let result = distributor.set_root_for_asset(&admin(), token(), Hash::new([4; 32]));
        assert!(matches!(result, Err(DistributorError::Unauthorized { .. })));
        distributor.set_root_for_asset(&alice(), token(), Hash::new([4; 32])).unwrap();
        assert_eq!(distributor.root_for_asset(&token()), Hash::new([4; 32]));
    }

    #[test]
    fn test_set_root_rejects_zero() {
        let (distributor, _ledger, tree) = setup();
        let result = distributor.set_root_for_asset(&admin(), token(), Hash::ZERO);
        assert!(matches!(result, Err(DistributorError::InvalidRoot)));
        assert_eq!(distributor.root_for_asset(&token()), tree.root());
    }

    #[test]
    fn test_root_update_keeps_settled_leaves() {
        let (distributor, ledger, tree) = setup();
        let proof = tree.proof(0).unwrap().siblings;
        distributor.claim(&token(), &alice(), 40_000, &proof).unwrap();

        // New tree still contains alice's line alongside a new one
        let carol = Address::repeat(0x03);
        let next = MerkleTree::from_leaves(vec![
            compute_leaf(&token(), &alice(), 40_000),
            compute_leaf(&token(), &carol, 1_000),
        ]);
        distributor.set_root_for_asset(&admin(), token(), next.root()).unwrap();

        let again = distributor
            .claim(&token(), &alice(), 40_000, &next.proof(0).unwrap().siblings)
            .unwrap();
        assert!(matches!(again, ClaimOutcome::AlreadySettled { .. }));
        assert_eq!(ledger.balance_of(&token(), &alice()), 40_000);
        assert_eq!(distributor.registered_assets(), vec![token()]);
    }

    #[test]
    fn test_check_claim_does_not_settle() {
        let (distributor, _ledger, tree) = setup();
        let proof = tree.proof(1).unwrap().siblings;
        let leaf = distributor.check_claim(&token(), &bob(), 60_000, &proof).unwrap();
        assert_eq!(leaf, Distributor::compute_leaf(&token(), &bob(), 60_000));
        assert!(!distributor.is_leaf_settled(&leaf));
    }

    #[test]
    fn test_restore_from_snapshot() {
        let snapshot = DistributorSnapshot {
            version: SNAPSHOT_VERSION,
            assets: vec![AssetRoot { asset: token(), root: Hash::new([4; 32]) }],
            settled: vec![Hash::new([6; 32])],
        };
        let distributor = Distributor::new(
            Arc::new(Ownable::new(admin())),
            Arc::new(MemoryLedger::new(custody())),
            Box::new(MemoryStore::with_snapshot(snapshot.clone())),
        )
        .unwrap();

        assert_eq!(distributor.root_for_asset(&token()), Hash::new([4; 32]));
        assert!(distributor.is_leaf_settled(&Hash::new([6; 32])));
        assert_eq!(distributor.snapshot(), snapshot);
    }

    #[test]
    fn test_restore_rejects_unknown_version() {
        let snapshot = DistributorSnapshot {
            version: 2,
            ..DistributorSnapshot::default()
        };
        let result = Distributor::new(
            Arc::new(Ownable::new(admin())),
            Arc::new(MemoryLedger::new(custody())),
            Box::new(MemoryStore::with_snapshot(snapshot)),
        );
        assert!(matches!(
            result,
            Err(DistributorError::Storage(StoreError::UnsupportedVersion(2)))
        ));
    }
}
