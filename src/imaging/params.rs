//! Resolved option bags handed to the backend.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations), which decides what a
//! request means (defaults, thumbnails, gravity degradation), and the
//! [`backend`](super::backend), which does the pixel work. Unlike
//! [`TransformParams`](crate::params::TransformParams) nothing here is
//! optional-because-unspecified: every decision has been made.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters (sigma + threshold).
//! - [`Anchor`]: Crop anchor the backend actually supports.
//! - [`TransformOptions`]: Full specification for a request-time transform.
//! - [`NormalizeOptions`]: Full specification for an upload-time normalization pass.

use crate::params::{Fit, Flip, OutputFormat, Rotation};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Unsharp mask for a requested radius, sharpening every pixel.
    pub fn with_radius(radius: f32) -> Self {
        Self {
            sigma: radius,
            threshold: 0,
        }
    }
}

/// Where a cover crop is anchored.
///
/// Only the five edge/center anchors plus `Smart` reach the backend; the
/// compound compass directions are folded into `Center` during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    Center,
    North,
    South,
    East,
    West,
    /// Content-aware crop where the backend supports it, center otherwise.
    Smart,
}

/// Request-time transformation, fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    /// Target box. One side may be open (aspect preserved).
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: Fit,
    pub anchor: Anchor,
    pub rotation: Rotation,
    pub flip: Option<Flip>,
    pub blur: Option<f32>,
    pub sharpening: Option<Sharpening>,
    pub grayscale: bool,
    /// Cap applied to the longest edge after sizing (never enlarges).
    pub max_edge: Option<u32>,
    /// `None` keeps the source format.
    pub format: Option<OutputFormat>,
    pub quality: Quality,
    pub strip_metadata: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            crop: Fit::Cover,
            anchor: Anchor::Center,
            rotation: Rotation::R0,
            flip: None,
            blur: None,
            sharpening: None,
            grayscale: false,
            max_edge: None,
            format: None,
            quality: Quality::default(),
            strip_metadata: true,
        }
    }
}

/// Upload-time normalization: auto-orient, strip metadata, and shrink to fit
/// inside `max_width`×`max_height` (never enlarging).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_85() {
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn sharpening_from_radius() {
        let s = Sharpening::with_radius(2.0);
        assert_eq!(s.sigma, 2.0);
        assert_eq!(s.threshold, 0);
    }

    #[test]
    fn default_options_strip_metadata() {
        let o = TransformOptions::default();
        assert!(o.strip_metadata);
        assert_eq!(o.anchor, Anchor::Center);
        assert_eq!(o.format, None);
    }
}
