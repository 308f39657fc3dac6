//! Image processing.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | header-only decode, orientation aware |
//! | **Transform** | rotate, flip, fit, crop, blur, sharpen, grayscale, re-encode |
//! | **Normalize** | auto-orient, strip metadata, shrink to a box |
//! | **Placeholder** | solid light-gray PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Fully resolved option bags handed to a backend
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, Transformed};
pub use operations::{
    NormalizeLimits, normalize_upload, placeholder_dimensions, placeholder_png, resolve_options,
};
pub use params::{Anchor, NormalizeOptions, Quality, Sharpening, TransformOptions};
pub use rust_backend::{RustBackend, sniff_format};
