//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the transformation capability: the rest of
//! the crate hands it raw bytes plus a fully resolved option bag and gets
//! encoded bytes back. It is the sole authority on pixel-level correctness.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, zero
//! external dependencies.

use super::params::{NormalizeOptions, TransformOptions};
use crate::params::OutputFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("{format} encode failed: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Output of a transform: encoded bytes and the format they are in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

/// Trait for image processing backends.
///
/// Implementations must be deterministic for identical input and shareable
/// across request threads.
pub trait ImageBackend: Send + Sync {
    /// Decode just enough to report pixel dimensions.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Apply a request-time transformation.
    fn transform(
        &self,
        bytes: &[u8],
        options: &TransformOptions,
    ) -> Result<Transformed, BackendError>;

    /// Whether the source holds more than one frame.
    fn is_animated(&self, bytes: &[u8]) -> Result<bool, BackendError>;

    /// Auto-orient, strip metadata and shrink to fit the given box.
    fn normalize(&self, bytes: &[u8], options: &NormalizeOptions) -> Result<Vec<u8>, BackendError>;
}

impl<B: ImageBackend + ?Sized> ImageBackend for Box<B> {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        (**self).identify(bytes)
    }

    fn transform(
        &self,
        bytes: &[u8],
        options: &TransformOptions,
    ) -> Result<Transformed, BackendError> {
        (**self).transform(bytes, options)
    }

    fn is_animated(&self, bytes: &[u8]) -> Result<bool, BackendError> {
        (**self).is_animated(bytes)
    }

    fn normalize(&self, bytes: &[u8], options: &NormalizeOptions) -> Result<Vec<u8>, BackendError> {
        (**self).normalize(bytes, options)
    }
}
