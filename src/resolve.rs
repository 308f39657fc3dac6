//! The read path: cache-aside image resolution.
//!
//! ```text
//! key = derive_key(identifier, params)
//! cache.get(key) ── hit ──────────────────────────────────────► bytes
//!       │ miss
//! storage.get(identifier) ── absent ──► gray placeholder (PNG)
//!       │ present
//! backend.transform(original, resolve_options(params))
//!       │
//! cache.set(key, transformed)   (best effort)
//!       └──────────────────────────────────────────────────────► bytes
//! ```
//!
//! Cache-lookup faults and durable-storage faults abort the request. A
//! missing original is not a fault: it produces a placeholder sized to the
//! request. Placeholders are never cached, so a later upload is served as
//! soon as it lands. A failed cache write is logged and the freshly
//! transformed bytes are returned anyway.
//!
//! Two concurrent requests for the same cold key may both transform; the
//! second cache write simply replaces the first with identical bytes.

use crate::cache_key::derive_key;
use crate::hasher::Hasher;
use crate::imaging::{
    BackendError, ImageBackend, placeholder_dimensions, placeholder_png, resolve_options,
    sniff_format,
};
use crate::params::{OutputFormat, TransformParams};
use crate::store::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Content type used when cached bytes don't sniff as a known image format.
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("cache lookup for {key} failed: {source}")]
    Cache {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("loading original {identifier} failed: {source}")]
    Storage {
        identifier: String,
        #[source]
        source: StoreError,
    },
    #[error("transforming {identifier} failed: {source}")]
    Transform {
        identifier: String,
        #[source]
        source: BackendError,
    },
    #[error("placeholder generation failed: {0}")]
    Placeholder(#[source] BackendError),
}

/// Bytes ready to serve, with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProcessedImage {
    /// Wrap previously produced bytes, recovering the content type from
    /// their magic number.
    fn sniffed(bytes: Vec<u8>) -> Self {
        let content_type = sniff_format(&bytes)
            .map_or(UNKNOWN_CONTENT_TYPE, OutputFormat::content_type)
            .to_string();
        Self {
            content_type,
            bytes,
        }
    }
}

/// Classification of a store read.
enum Lookup {
    Found(Vec<u8>),
    Missing,
}

/// Fold `Ok(None)` and `Err(NotFound)` into one "missing" outcome.
fn lookup(result: Result<Option<Vec<u8>>, StoreError>) -> Result<Lookup, StoreError> {
    match result {
        Ok(Some(bytes)) => Ok(Lookup::Found(bytes)),
        Ok(None) => Ok(Lookup::Missing),
        Err(e) if e.is_not_found() => Ok(Lookup::Missing),
        Err(e) => Err(e),
    }
}

/// Cache-aside resolver over a cache store, a durable store and an image
/// backend.
pub struct Resolver {
    cache: Arc<dyn Store>,
    storage: Arc<dyn Store>,
    hasher: Arc<dyn Hasher>,
    backend: Arc<dyn ImageBackend>,
}

impl Resolver {
    pub fn new(
        cache: Arc<dyn Store>,
        storage: Arc<dyn Store>,
        hasher: Arc<dyn Hasher>,
        backend: Arc<dyn ImageBackend>,
    ) -> Self {
        Self {
            cache,
            storage,
            hasher,
            backend,
        }
    }

    /// Resolve `identifier` transformed by `params`.
    pub fn get(
        &self,
        identifier: &str,
        params: &TransformParams,
    ) -> Result<ProcessedImage, ResolveError> {
        let key = derive_key(identifier, params, self.hasher.as_ref());

        let cached = lookup(self.cache.get(&key)).map_err(|source| ResolveError::Cache {
            key: key.clone(),
            source,
        })?;
        if let Lookup::Found(bytes) = cached {
            debug!(%key, "cache hit");
            return Ok(ProcessedImage::sniffed(bytes));
        }
        debug!(%key, "cache miss");

        let original = match lookup(self.storage.get(identifier)) {
            Ok(Lookup::Found(bytes)) => bytes,
            Ok(Lookup::Missing) => return self.placeholder(identifier, params),
            Err(source) => {
                return Err(ResolveError::Storage {
                    identifier: identifier.to_string(),
                    source,
                });
            }
        };

        let options = resolve_options(params);
        debug!(identifier, ?options, "transforming");
        let transformed = self
            .backend
            .transform(&original, &options)
            .map_err(|source| ResolveError::Transform {
                identifier: identifier.to_string(),
                source,
            })?;

        if let Err(e) = self.cache.set(&key, &transformed.bytes) {
            warn!(%key, error = %e, "cache write failed, serving uncached result");
        }

        Ok(ProcessedImage {
            content_type: transformed.format.content_type().to_string(),
            bytes: transformed.bytes,
        })
    }

    fn placeholder(
        &self,
        identifier: &str,
        params: &TransformParams,
    ) -> Result<ProcessedImage, ResolveError> {
        let (width, height) = placeholder_dimensions(params);
        info!(identifier, width, height, "original not found, serving placeholder");
        let bytes = placeholder_png(width, height).map_err(ResolveError::Placeholder)?;
        Ok(ProcessedImage {
            content_type: OutputFormat::Png.content_type().to_string(),
            bytes,
        })
    }
}
