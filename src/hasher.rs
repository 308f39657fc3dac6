//! Content fingerprints.
//!
//! A [`Hasher`] turns raw bytes into a deterministic lowercase-hex digest.
//! The same trait names uploaded originals (content addressing) and
//! fingerprints the canonical form of transformation parameters
//! (see [`cache_key`](crate::cache_key)).
//!
//! | Hasher | Digest | Hex length |
//! |---|---|---|
//! | [`Sha256Hasher`] (default) | SHA-256 | 64 |
//! | [`Blake3Hasher`] | BLAKE3-256 | 64 |

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic, collision-resistant fingerprint of a byte slice.
pub trait Hasher: Send + Sync {
    /// Hex-encoded digest of `bytes`. Must be pure: equal input, equal output.
    fn hash(&self, bytes: &[u8]) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(&self, bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn hash(&self, bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }
}

/// Hash algorithm selector used by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    pub fn build(self) -> Box<dyn Hasher> {
        match self {
            HashAlgorithm::Sha256 => Box::new(Sha256Hasher),
            HashAlgorithm::Blake3 => Box::new(Blake3Hasher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_digest() {
        assert_eq!(
            Sha256Hasher.hash(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn sha256_deterministic() {
        assert_eq!(Sha256Hasher.hash(b"abc"), Sha256Hasher.hash(b"abc"));
        assert_ne!(Sha256Hasher.hash(b"abc"), Sha256Hasher.hash(b"abd"));
    }

    #[test]
    fn blake3_is_64_hex_chars() {
        let h = Blake3Hasher.hash(b"version 1");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(h, Blake3Hasher.hash(b"version 2"));
    }

    #[test]
    fn algorithms_disagree() {
        assert_ne!(Sha256Hasher.hash(b"x"), Blake3Hasher.hash(b"x"));
    }

    #[test]
    fn algorithm_builds_matching_hasher() {
        let h = HashAlgorithm::Blake3.build();
        assert_eq!(h.hash(b"x"), Blake3Hasher.hash(b"x"));
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha256);
    }
}
