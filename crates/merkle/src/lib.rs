//! DropCraft Merkle
//!
//! Sorted-pair keccak256 Merkle verification, plus the matching tree builder.
//!
//! The distributor only ever calls [`verify`]. [`MerkleTree`] exists so that
//! whoever prepares an entitlement list (the CLI, tests, external tooling
//! written against this crate) builds trees under exactly the same pairing
//! rule the verifier folds with.

pub mod merkle;

pub use merkle::{hash_pair, verify, MerkleProof, MerkleTree};
