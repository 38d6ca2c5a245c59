//! Per-asset root registry.

use std::collections::HashMap;

use dropcraft_core::{AssetId, Hash};

use crate::access::AdminCapability;
use crate::store::{AssetRoot, StoreError};
use crate::{DistributorError, Result};

/// Maps each asset to its current Merkle root and remembers the order in which
/// assets were first registered.
///
/// Every asset in `assets` has a non-zero root in `roots` and vice versa; an
/// asset appears in `assets` exactly once.
#[derive(Debug, Clone, Default)]
pub struct RootRegistry {
    roots: HashMap<AssetId, Hash>,
    assets: Vec<AssetId>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `root` as the current root for `asset`.
    ///
    /// Returns `true` when this is the asset's first root (it was appended to
    /// the registry), `false` when an existing root was replaced. The zero hash
    /// is rejected; it is reserved for "no root".
    pub fn set_root(&mut self, _cap: &AdminCapability, asset: AssetId, root: Hash) -> Result<bool> {
        if root.is_zero() {
            return Err(DistributorError::InvalidRoot);
        }
        let newly_registered = self.roots.insert(asset, root).is_none();
        if newly_registered {
            self.assets.push(asset);
        }
        Ok(newly_registered)
    }

    /// Current root for `asset`, or `Hash::ZERO` if none was published.
    pub fn current_root(&self, asset: &AssetId) -> Hash {
        self.roots.get(asset).copied().unwrap_or(Hash::ZERO)
    }

    pub fn has_root(&self, asset: &AssetId) -> bool {
        self.roots.contains_key(asset)
    }

    /// Registered assets in first-registration order.
    pub fn list_assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub(crate) fn entries(&self) -> Vec<AssetRoot> {
        self.assets
            .iter()
            .map(|asset| AssetRoot {
                asset: *asset,
                root: self.current_root(asset),
            })
            .collect()
    }

    /// Rebuild from persisted entries, keeping their order.
    pub(crate) fn from_entries(entries: &[AssetRoot]) -> std::result::Result<Self, StoreError> {
        let mut registry = Self::new();
        for entry in entries {
            if entry.root.is_zero() {
                return Err(StoreError::Corrupt(format!("zero root stored for {}", entry.asset)));
            }
            if registry.roots.insert(entry.asset, entry.root).is_some() {
                return Err(StoreError::Corrupt(format!("asset {} stored twice", entry.asset)));
            }
            registry.assets.push(entry.asset);
        }
        Ok(registry)
    }
}
