//! keccak256 over a sequence of byte slices.

use sha3::{Digest, Keccak256};

use crate::Hash;

/// `keccak256(parts[0] || parts[1] || ...)`
///
/// Same digest as Solidity's `keccak256`, not NIST SHA3-256.
pub fn keccak256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        let expected: Hash = "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
            .parse()
            .unwrap();
        assert_eq!(keccak256(&[]), expected);
    }

    #[test]
    fn test_keccak256_abc() {
        let expected: Hash = "0x4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
            .parse()
            .unwrap();
        assert_eq!(keccak256(&[b"abc"]), expected);
    }

    #[test]
    fn test_keccak256_parts_concatenate() {
        assert_eq!(keccak256(&[b"a", b"bc"]), keccak256(&[b"abc"]));
        assert_eq!(keccak256(&[b"", b"abc", b""]), keccak256(&[b"abc"]));
    }
}
