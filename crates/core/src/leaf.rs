//! Canonical leaf encoding.
//!
//! `leaf = keccak256(asset[20] || recipient[20] || amount_be[32])`
//!
//! The 72-byte preimage is exactly Solidity's
//! `abi.encodePacked(address asset, address recipient, uint256 amount)`, so any
//! off-chain tree builder that follows that layout reproduces our leaves.
//! Changing a field width or order changes every leaf and breaks every proof.

use serde::{Deserialize, Serialize};

use crate::{keccak256, AccountId, Amount, AssetId, Hash};

/// Length of the encoded entitlement preimage
pub const ENTITLEMENT_ENCODED_LEN: usize = 20 + 20 + 32;

/// One line of an entitlement list: `recipient` may claim `amount` of `asset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub asset: AssetId,
    pub recipient: AccountId,
    pub amount: Amount,
}

impl Entitlement {
    pub fn new(asset: AssetId, recipient: AccountId, amount: Amount) -> Self {
        Self { asset, recipient, amount }
    }

    /// Leaf hash for this entitlement
    pub fn leaf(&self) -> Hash {
        compute_leaf(&self.asset, &self.recipient, self.amount)
    }
}

/// Amount as a 32-byte big-endian unsigned integer
pub fn encode_amount(amount: Amount) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&amount.to_be_bytes());
    out
}

/// The exact bytes that are hashed into a leaf.
pub fn encode_entitlement(
    asset: &AssetId,
    recipient: &AccountId,
    amount: Amount,
) -> [u8; ENTITLEMENT_ENCODED_LEN] {
    let mut out = [0u8; ENTITLEMENT_ENCODED_LEN];
    out[..20].copy_from_slice(asset.as_bytes());
    out[20..40].copy_from_slice(recipient.as_bytes());
    out[40..].copy_from_slice(&encode_amount(amount));
    out
}

/// Compute the Merkle leaf for `(asset, recipient, amount)`.
///
/// The amount is hashed as a uint256, but [`Amount`] is `u128`: leaves for
/// amounts of 2^128 or more cannot be produced or claimed here. Trees built
/// elsewhere must keep every amount below that bound.
pub fn compute_leaf(asset: &AssetId, recipient: &AccountId, amount: Amount) -> Hash {
    keccak256(&[&encode_entitlement(asset, recipient, amount)])
}
