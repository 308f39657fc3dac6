//! Key → bytes storage.
//!
//! One trait, two roles. The resolver holds two independent [`Store`]s:
//! a fast ephemeral **cache** for transformed variants and a durable
//! **storage** for uploaded originals. Either role can be backed by any
//! implementation:
//!
//! | Backend | Typical role | Notes |
//! |---|---|---|
//! | [`MemoryStore`] | cache | `RwLock`-guarded map, no expiry |
//! | [`FilesystemStore`] | storage, or cache with a TTL sweep | one flat file per key |
//!
//! ## Absence is not an error
//!
//! [`Store::get`] returns `Ok(None)` for a missing key. `Err` is reserved for
//! genuine back-end faults. Callers that prefer the error form use
//! [`Store::fetch`], which turns absence into [`StoreError::NotFound`].

pub mod filesystem;
pub mod memory;

pub use filesystem::{FilesystemStore, FilesystemStoreOptions};
pub use memory::MemoryStore;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key not found: {key}")]
    NotFound { key: String },
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// True for the caller-recoverable "nothing stored under this key" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Uniform key → bytes capability.
///
/// All operations are atomic at single-key granularity. Implementations must
/// be shareable across request threads.
pub trait Store: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value.
    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Read the value under `key`; `Ok(None)` when nothing is stored.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Release background resources. Idempotent.
    fn close(&self) -> Result<(), StoreError>;

    /// Like [`get`](Store::get), but absence is [`StoreError::NotFound`].
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.get(key)?.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, bytes)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn close(&self) -> Result<(), StoreError> {
        (**self).close()
    }
}
