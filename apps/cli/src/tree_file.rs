//! Distribution tree files produced by `build-tree` and consumed by `claim --tree`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use dropcraft_core::{AccountId, Amount, AssetId, Entitlement, Hash};
use dropcraft_merkle::MerkleTree;

/// One tree per asset, in the order assets first appear in the input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeFile {
    pub trees: Vec<AssetTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetTree {
    pub asset: AssetId,
    pub root: Hash,
    pub claims: Vec<ClaimEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEntry {
    pub recipient: AccountId,
    pub amount: Amount,
    pub leaf: Hash,
    pub proof: Vec<Hash>,
}

impl TreeFile {
    /// Build per-asset trees from an entitlement list.
    ///
    /// Identical lines would share one leaf and only one could ever be claimed,
    /// so they are rejected.
    pub fn build(entitlements: &[Entitlement]) -> Result<Self> {
        let mut groups: Vec<(AssetId, Vec<Entitlement>)> = Vec::new();
        for ent in entitlements {
            match groups.iter_mut().find(|(asset, _)| *asset == ent.asset) {
                Some((_, group)) => group.push(*ent),
                None => groups.push((ent.asset, vec![*ent])),
            }
        }

        let mut trees = Vec::with_capacity(groups.len());
        for (asset, group) in groups {
            let tree = MerkleTree::from_entitlements(&group);

            let mut seen = HashSet::new();
            for leaf in tree.leaves() {
                if !seen.insert(*leaf) {
                    bail!("duplicate entitlement for asset {} (leaf {})", asset, leaf);
                }
            }

            let claims = group
                .iter()
                .enumerate()
                .map(|(i, ent)| {
                    let proof = tree
                        .proof(i)
                        .map(|p| p.siblings)
                        .unwrap_or_default();
                    ClaimEntry {
                        recipient: ent.recipient,
                        amount: ent.amount,
                        leaf: ent.leaf(),
                        proof,
                    }
                })
                .collect();

            trees.push(AssetTree {
                asset,
                root: tree.root(),
                claims,
            });
        }

        Ok(Self { trees })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tree file {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse tree file {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write tree file {:?}", path))
    }

    /// Find the entry for `recipient` under `asset`. With `amount` set, the
    /// entry must also match it.
    pub fn find(
        &self,
        asset: &AssetId,
        recipient: &AccountId,
        amount: Option<Amount>,
    ) -> Option<&ClaimEntry> {
        self.trees
            .iter()
            .filter(|tree| tree.asset == *asset)
            .flat_map(|tree| tree.claims.iter())
            .find(|entry| entry.recipient == *recipient && amount.map_or(true, |a| a == entry.amount))
    }
}

/// Read an entitlement list: a JSON array of `{asset, recipient, amount}`.
pub fn load_entitlements(path: &Path) -> Result<Vec<Entitlement>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read entitlements {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse entitlements {:?}", path))
}
