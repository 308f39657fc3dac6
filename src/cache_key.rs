//! Cache keys for transformed variants.
//!
//! `key = identifier ++ hash(canonical_string(params))`
//!
//! The identifier prefix keeps every variant of one original grouped (and
//! greppable on disk); the hash suffix keeps the key a fixed length and safe
//! to use as a file name whatever the parameters contain.

use crate::hasher::Hasher;
use crate::params::TransformParams;

/// Derive the cache key for `(identifier, params)`.
///
/// Pure: equal inputs always give equal keys, and parameter sets that differ
/// in any field give different keys (up to hash collisions).
pub fn derive_key(identifier: &str, params: &TransformParams, hasher: &dyn Hasher) -> String {
    let fingerprint = hasher.hash(params.canonical_string().as_bytes());
    format!("{identifier}{fingerprint}")
}
