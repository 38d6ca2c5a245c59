//! Binary Merkle tree over entitlement leaves.
//!
//! Leaf formula: `dropcraft_core::compute_leaf` (keccak256 of the packed entitlement).
//! Internal nodes: `keccak256(min(a, b) || max(a, b))`, bytewise ordering.
//! An odd node at the end of a level is promoted to the next level unchanged.
//!
//! Because pairs are sorted before hashing, a proof is just the list of sibling
//! hashes from leaf to root; no left/right flags are needed. This is the same
//! convention as OpenZeppelin's `MerkleProof.verify` and merkletreejs with
//! `sortPairs: true`. The builder and the verifier MUST agree on it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use dropcraft_core::{keccak256, Entitlement, Hash};

/// Sibling hashes from leaf level to root, plus the leaf position they were cut for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Index of the leaf in the input leaf list
    pub leaf_index: usize,
    /// Sibling hashes from leaf level to root (bottom-up)
    pub siblings: Vec<Hash>,
}

/// A binary Merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes stored level by level, bottom-up. `layers[0]` = leaves.
    layers: Vec<Vec<Hash>>,
}

/// Hash two nodes into their parent, smaller operand first.
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    if a <= b {
        keccak256(&[a.as_bytes(), b.as_bytes()])
    } else {
        keccak256(&[b.as_bytes(), a.as_bytes()])
    }
}

/// Fold `proof` onto `leaf` and compare with `root`.
///
/// An empty proof accepts only when the tree is the single leaf itself.
pub fn verify(leaf: &Hash, proof: &[Hash], root: &Hash) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |current, sibling| hash_pair(&current, sibling));
    computed == *root
}

impl MerkleTree {
    /// Build a tree from an entitlement list, in list order.
    pub fn from_entitlements(entitlements: &[Entitlement]) -> Self {
        Self::from_leaves(entitlements.iter().map(Entitlement::leaf).collect())
    }

    /// Build a tree from pre-hashed leaves.
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        if leaves.is_empty() {
            return Self { layers: Vec::new() };
        }

        let mut layers = vec![leaves];

        loop {
            let prev = &layers[layers.len() - 1];
            if prev.len() <= 1 {
                break;
            }
            let next: Vec<Hash> = prev
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            layers.push(next);
        }

        debug!("Built Merkle tree: {} leaves, depth {}", layers[0].len(), layers.len() - 1);
        Self { layers }
    }

    /// The Merkle root, or `Hash::ZERO` for an empty tree.
    pub fn root(&self) -> Hash {
        self.layers
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// Generate a proof for the leaf at `leaf_index`.
    ///
    /// Returns `None` if the index is out of range.
    pub fn proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        if leaf_index >= self.leaf_count() {
            return None;
        }

        let mut siblings = Vec::with_capacity(self.layers.len().saturating_sub(1));
        let mut idx = leaf_index;

        for layer in &self.layers[..self.layers.len() - 1] {
            // A promoted node has no sibling at this level
            let sibling_idx = idx ^ 1;
            if let Some(sibling) = layer.get(sibling_idx) {
                siblings.push(*sibling);
            }
            idx /= 2;
        }

        Some(MerkleProof { leaf_index, siblings })
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// The leaf level, in input order.
    pub fn leaves(&self) -> &[Hash] {
        self.layers.first().map(Vec::as_slice).unwrap_or(&[])
    }
}
