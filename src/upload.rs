//! The write path: validate → normalize → hash → store.
//!
//! The identifier handed back is the content hash of the bytes actually
//! stored, so uploading the same image twice yields the same identifier and
//! a single stored original.

use crate::hasher::Hasher;
use crate::imaging::{ImageBackend, NormalizeLimits, normalize_upload};
use crate::params::OutputFormat;
use crate::store::{Store, StoreError};
use image::ImageFormat;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("storing original {identifier} failed: {source}")]
    Storage {
        identifier: String,
        #[source]
        source: StoreError,
    },
}

/// Ingress and normalization limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Largest accepted upload in bytes.
    pub max_bytes: usize,
    /// Auto-orient, strip metadata and downscale before storing.
    pub normalize: bool,
    /// Longest-edge ceiling applied during normalization.
    pub max_dimension: u32,
    /// Storage budget; normalized output above it is shrunk further.
    pub max_stored_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            normalize: true,
            max_dimension: 4096,
            max_stored_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Sniff the container and accept only formats we serve as originals.
fn classify(bytes: &[u8]) -> Result<OutputFormat, UploadError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok(OutputFormat::Jpeg),
        Ok(ImageFormat::Png) => Ok(OutputFormat::Png),
        Ok(ImageFormat::Gif) => Ok(OutputFormat::Gif),
        Ok(ImageFormat::WebP) => Ok(OutputFormat::Webp),
        Ok(other) => Err(UploadError::UnsupportedType(
            other.to_mime_type().to_string(),
        )),
        Err(_) => Err(UploadError::UnsupportedType(
            "application/octet-stream".to_string(),
        )),
    }
}

pub struct Uploader {
    storage: Arc<dyn Store>,
    hasher: Arc<dyn Hasher>,
    backend: Arc<dyn ImageBackend>,
    limits: UploadLimits,
}

impl Uploader {
    pub fn new(
        storage: Arc<dyn Store>,
        hasher: Arc<dyn Hasher>,
        backend: Arc<dyn ImageBackend>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            storage,
            hasher,
            backend,
            limits,
        }
    }

    /// Store an uploaded image and return its identifier.
    pub fn upload(&self, bytes: &[u8]) -> Result<String, UploadError> {
        if bytes.len() > self.limits.max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: self.limits.max_bytes,
            });
        }
        let format = classify(bytes)?;
        debug!(%format, bytes = bytes.len(), "accepted upload");

        let normalized;
        let payload: &[u8] = if self.limits.normalize {
            let limits = NormalizeLimits {
                max_dimension: self.limits.max_dimension,
                max_bytes: self.limits.max_stored_bytes,
            };
            match normalize_upload(self.backend.as_ref(), bytes, format, limits) {
                Ok(out) => {
                    normalized = out;
                    &normalized
                }
                Err(e) => {
                    warn!(error = %e, "normalization failed, storing original bytes");
                    bytes
                }
            }
        } else {
            bytes
        };

        let identifier = self.hasher.hash(payload);
        self.storage
            .set(&identifier, payload)
            .map_err(|source| UploadError::Storage {
                identifier: identifier.clone(),
                source,
            })?;
        info!(%identifier, bytes = payload.len(), "stored original");
        Ok(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Sha256Hasher;
    use crate::imaging::backend::tests::MockBackend;
    use crate::store::MemoryStore;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0";

    fn payload(magic: &[u8], len: usize) -> Vec<u8> {
        let mut bytes = magic.to_vec();
        bytes.resize(len, 7);
        bytes
    }

    fn uploader(backend: MockBackend, limits: UploadLimits) -> (Uploader, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let uploader = Uploader::new(
            storage.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(backend),
            limits,
        );
        (uploader, storage)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn rejects_oversized_upload() {
        let (up, storage) = uploader(MockBackend::new(), UploadLimits::default());
        let err = up.upload(&payload(PNG_MAGIC, 1024 * 1024 + 1)).unwrap_err();
        assert!(matches!(
            err,
            UploadError::TooLarge {
                size: 1_048_577,
                limit: 1_048_576
            }
        ));
        assert!(storage.is_empty());
    }

    #[test]
    fn exact_limit_is_accepted() {
        let limits = UploadLimits {
            normalize: false,
            ..UploadLimits::default()
        };
        let (up, _) = uploader(MockBackend::new(), limits);
        assert!(up.upload(&payload(PNG_MAGIC, 1024 * 1024)).is_ok());
    }

    #[test]
    fn rejects_unknown_bytes() {
        let (up, _) = uploader(MockBackend::new(), UploadLimits::default());
        let err = up.upload(b"just some text").unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
    }

    #[test]
    fn rejects_image_formats_outside_the_allow_list() {
        let (up, _) = uploader(MockBackend::new(), UploadLimits::default());
        let err = up.upload(&payload(b"BM", 64)).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(ref t) if t == "image/bmp"));
    }

    #[test]
    fn classify_allow_list() {
        assert_eq!(classify(&payload(JPEG_MAGIC, 16)).unwrap(), OutputFormat::Jpeg);
        assert_eq!(classify(&payload(PNG_MAGIC, 16)).unwrap(), OutputFormat::Png);
        assert_eq!(classify(&payload(b"GIF89a", 16)).unwrap(), OutputFormat::Gif);
        assert_eq!(
            classify(&payload(b"RIFF\0\0\0\0WEBP", 16)).unwrap(),
            OutputFormat::Webp
        );
    }

    // =========================================================================
    // Hashing and storage
    // =========================================================================

    #[test]
    fn identifier_is_content_hash_of_stored_bytes() {
        let limits = UploadLimits {
            normalize: false,
            ..UploadLimits::default()
        };
        let (up, storage) = uploader(MockBackend::new(), limits);
        let bytes = payload(PNG_MAGIC, 100);

        let id = up.upload(&bytes).unwrap();

        assert_eq!(id, Sha256Hasher.hash(&bytes));
        assert_eq!(storage.get(&id).unwrap(), Some(bytes));
    }

    #[test]
    fn same_content_same_identifier() {
        let limits = UploadLimits {
            normalize: false,
            ..UploadLimits::default()
        };
        let (up, storage) = uploader(MockBackend::new(), limits);
        let bytes = payload(JPEG_MAGIC, 50);
        assert_eq!(up.upload(&bytes).unwrap(), up.upload(&bytes).unwrap());
        assert_eq!(storage.len(), 1);
    }

    // =========================================================================
    // Normalization
    // =========================================================================

    #[test]
    fn normalized_bytes_are_stored_and_hashed() {
        let limits = UploadLimits {
            max_stored_bytes: 100,
            ..UploadLimits::default()
        };
        let (up, storage) = uploader(MockBackend::with_dimensions(1000, 1000), limits);
        let bytes = payload(PNG_MAGIC, 400);

        let id = up.upload(&bytes).unwrap();
        let stored = storage.get(&id).unwrap().unwrap();

        assert!(stored.len() <= 100);
        assert_eq!(id, Sha256Hasher.hash(&stored));
    }

    #[test]
    fn animated_upload_is_stored_untouched() {
        let limits = UploadLimits {
            max_stored_bytes: 100,
            ..UploadLimits::default()
        };
        let backend = MockBackend {
            animated: true,
            ..MockBackend::with_dimensions(1000, 1000)
        };
        let (up, storage) = uploader(backend, limits);
        let bytes = payload(b"GIF89a", 400);

        let id = up.upload(&bytes).unwrap();

        assert_eq!(storage.get(&id).unwrap(), Some(bytes));
    }

    #[test]
    fn normalization_failure_falls_back_to_original() {
        // No mock dimensions: identify fails.
        let (up, storage) = uploader(MockBackend::new(), UploadLimits::default());
        let bytes = payload(PNG_MAGIC, 80);

        let id = up.upload(&bytes).unwrap();

        assert_eq!(id, Sha256Hasher.hash(&bytes));
        assert_eq!(storage.get(&id).unwrap(), Some(bytes));
    }
}
