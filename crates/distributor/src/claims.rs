use std::collections::HashSet;

use dropcraft_core::Hash;

/// Set of leaves that have been paid out.
///
/// A leaf enters the set at most once and is only taken out again by the
/// distributor when the transfer that follows fails.
#[derive(Debug, Clone, Default)]
pub struct ClaimLedger {
    settled: HashSet<Hash>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_settled(&self, leaf: &Hash) -> bool {
        self.settled.contains(leaf)
    }

    /// Mark `leaf` settled. Returns `false` if it already was.
    pub fn try_settle(&mut self, leaf: Hash) -> bool {
        self.settled.insert(leaf)
    }

    pub(crate) fn revert(&mut self, leaf: &Hash) {
        self.settled.remove(leaf);
    }

    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }

    /// Settled leaves in ascending order, for stable snapshots.
    pub(crate) fn sorted_leaves(&self) -> Vec<Hash> {
        let mut leaves: Vec<Hash> = self.settled.iter().copied().collect();
        leaves.sort();
        leaves
    }

    pub(crate) fn from_leaves(leaves: &[Hash]) -> Self {
        Self {
            settled: leaves.iter().copied().collect(),
        }
    }
}
