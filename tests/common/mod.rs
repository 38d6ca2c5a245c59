//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use dropcraft_core::{compute_leaf, AccountId, Address, Amount, AssetId, Hash};
use dropcraft_distributor::{Distributor, MemoryLedger, Ownable, StateStore};
use dropcraft_merkle::MerkleTree;

/// 10^18, one whole token at 18 decimals
pub const ETHER: Amount = 1_000_000_000_000_000_000;

pub fn owner() -> AccountId {
    Address::repeat(0xAD)
}

pub fn custody() -> AccountId {
    Address::repeat(0xC0)
}

pub fn user1() -> AccountId {
    Address::repeat(0x01)
}

pub fn user2() -> AccountId {
    Address::repeat(0x02)
}

pub fn token(n: u8) -> AssetId {
    Address::repeat(0x70 + n)
}

/// The canonical two-line drop: user1 gets 40_000, user2 gets 60_000.
pub struct Airdrop {
    pub asset: AssetId,
    pub tree: MerkleTree,
}

impl Airdrop {
    pub fn two_users(asset: AssetId) -> Self {
        let tree = MerkleTree::from_leaves(vec![
            compute_leaf(&asset, &user1(), 40_000 * ETHER),
            compute_leaf(&asset, &user2(), 60_000 * ETHER),
        ]);
        Self { asset, tree }
    }

    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    pub fn proof(&self, index: usize) -> Vec<Hash> {
        self.tree.proof(index).expect("leaf index in range").siblings
    }
}

/// Ledger with 100_000 tokens of each given asset in custody.
pub fn funded_ledger(assets: &[AssetId]) -> Arc<MemoryLedger> {
    let ledger = Arc::new(MemoryLedger::new(custody()));
    for asset in assets {
        ledger.mint(asset, &custody(), 100_000 * ETHER).unwrap();
    }
    ledger
}

pub fn distributor(ledger: &Arc<MemoryLedger>) -> Distributor {
    Distributor::in_memory(Arc::new(Ownable::new(owner())), ledger.clone())
}

pub fn distributor_with_store(ledger: &Arc<MemoryLedger>, store: Box<dyn StateStore>) -> Distributor {
    Distributor::new(Arc::new(Ownable::new(owner())), ledger.clone(), store)
        .expect("state should load")
}
