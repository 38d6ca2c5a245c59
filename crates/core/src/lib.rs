//! DropCraft Core Types
//!
//! Fundamental data structures shared by every DropCraft crate: addresses,
//! hashes, amounts, and the canonical leaf encoding of an entitlement.

mod error;
mod hash;
mod leaf;
mod types;

pub use error::*;
pub use hash::keccak256;
pub use leaf::*;
pub use types::*;
