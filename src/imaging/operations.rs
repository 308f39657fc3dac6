//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take a
//! caller's request, decide what it means, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{cap_longest_edge, downscale_for_budget};
use super::params::{Anchor, NormalizeOptions, Quality, Sharpening, TransformOptions};
use crate::params::{Fit, Gravity, OutputFormat, Rotation, TransformParams};
use image::{ImageEncoder, RgbImage};
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Longest edge served when the caller asked for no transformation.
pub const WEB_MAX_EDGE: u32 = 2048;
/// Quality used whenever the caller didn't choose one.
pub const DEFAULT_QUALITY: u8 = 85;
/// Quality for upload normalization re-encodes.
pub const NORMALIZE_QUALITY: u8 = 90;

pub const PLACEHOLDER_DEFAULT_SIZE: (u32, u32) = (400, 300);
pub const PLACEHOLDER_MIN_EDGE: u32 = 100;
pub const PLACEHOLDER_FILL: [u8; 3] = [0xEE, 0xEE, 0xEE];

/// Upper bound on encode passes while shrinking toward the byte budget.
const MAX_NORMALIZE_PASSES: usize = 8;

/// Fold a requested gravity into an anchor every backend understands.
pub fn resolve_anchor(gravity: Option<Gravity>) -> Anchor {
    match gravity {
        None | Some(Gravity::Center) => Anchor::Center,
        Some(Gravity::North) => Anchor::North,
        Some(Gravity::South) => Anchor::South,
        Some(Gravity::East) => Anchor::East,
        Some(Gravity::West) => Anchor::West,
        Some(Gravity::Smart) => Anchor::Smart,
        Some(
            Gravity::NorthEast | Gravity::NorthWest | Gravity::SouthEast | Gravity::SouthWest,
        ) => Anchor::Center,
    }
}

/// Turn a caller's request into the concrete option bag for the backend.
///
/// An empty request gets web defaults: longest edge capped at
/// [`WEB_MAX_EDGE`], WebP at quality [`DEFAULT_QUALITY`], metadata stripped.
/// Otherwise unset quality falls back to [`DEFAULT_QUALITY`] and an unset
/// format keeps the source format. `thumbnail=N` without explicit `w`/`h`
/// becomes an N×N cover crop.
pub fn resolve_options(params: &TransformParams) -> TransformOptions {
    if params.is_empty() {
        return TransformOptions {
            crop: Fit::Inside,
            max_edge: Some(WEB_MAX_EDGE),
            format: Some(OutputFormat::Webp),
            quality: Quality::new(DEFAULT_QUALITY),
            ..TransformOptions::default()
        };
    }

    let (width, height) = match (params.width(), params.height(), params.thumbnail()) {
        (None, None, Some(edge)) => (Some(edge), Some(edge)),
        (w, h, _) => (w, h),
    };

    TransformOptions {
        width,
        height,
        crop: params.fit().unwrap_or(Fit::Cover),
        anchor: resolve_anchor(params.gravity()),
        rotation: params.rotate().unwrap_or(Rotation::R0),
        flip: params.flip(),
        blur: params.blur(),
        sharpening: params.sharpen().map(Sharpening::with_radius),
        grayscale: params.grayscale(),
        max_edge: None,
        format: params.format(),
        quality: Quality::new(params.quality().unwrap_or(DEFAULT_QUALITY)),
        strip_metadata: true,
    }
}

/// Placeholder size for a request: the requested box (or 400×300), with
/// each side floored at [`PLACEHOLDER_MIN_EDGE`].
pub fn placeholder_dimensions(params: &TransformParams) -> (u32, u32) {
    let (default_w, default_h) = PLACEHOLDER_DEFAULT_SIZE;
    let width = params.width().or(params.thumbnail()).unwrap_or(default_w);
    let height = params.height().or(params.thumbnail()).unwrap_or(default_h);
    (width.max(PLACEHOLDER_MIN_EDGE), height.max(PLACEHOLDER_MIN_EDGE))
}

/// Solid light-gray PNG of the given size.
pub fn placeholder_png(width: u32, height: u32) -> Result<Vec<u8>> {
    let img = RgbImage::from_pixel(width, height, image::Rgb(PLACEHOLDER_FILL));
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| BackendError::Encode {
            format: OutputFormat::Png,
            message: e.to_string(),
        })?;
    Ok(out)
}

/// Limits for upload normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeLimits {
    /// Longest-edge ceiling.
    pub max_dimension: u32,
    /// Encoded-size budget; exceeding it triggers further downscaling.
    pub max_bytes: u64,
}

/// Normalize an upload: orient, strip metadata, cap dimensions, then keep
/// shrinking by `sqrt(budget / size)` until the encoding fits the byte
/// budget or the pass limit is reached. Returns the last encoding.
///
/// Animated sources are returned unchanged: a decode/re-encode would keep
/// only the first frame.
pub fn normalize_upload(
    backend: &(impl ImageBackend + ?Sized),
    bytes: &[u8],
    format: OutputFormat,
    limits: NormalizeLimits,
) -> Result<Vec<u8>> {
    if backend.is_animated(bytes)? {
        debug!("animated source, keeping original frames");
        return Ok(bytes.to_vec());
    }
    let dims = backend.identify(bytes)?;
    let mut target = cap_longest_edge((dims.width, dims.height), limits.max_dimension);
    let options = |(max_width, max_height): (u32, u32)| NormalizeOptions {
        max_width,
        max_height,
        format,
        quality: Quality::new(NORMALIZE_QUALITY),
    };

    let mut out = backend.normalize(bytes, &options(target))?;
    for _ in 0..MAX_NORMALIZE_PASSES {
        let len = out.len() as u64;
        if len <= limits.max_bytes {
            break;
        }
        target = downscale_for_budget(target, len, limits.max_bytes);
        debug!(
            bytes = len,
            budget = limits.max_bytes,
            width = target.0,
            height = target.1,
            "over storage budget, downscaling"
        );
        out = backend.normalize(bytes, &options(target))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    fn query(q: &str) -> TransformParams {
        TransformParams::from_query(q).unwrap()
    }

    // =========================================================================
    // resolve_options tests
    // =========================================================================

    #[test]
    fn empty_request_gets_web_defaults() {
        let o = resolve_options(&TransformParams::default());
        assert_eq!(o.max_edge, Some(2048));
        assert_eq!(o.format, Some(OutputFormat::Webp));
        assert_eq!(o.quality.value(), 85);
        assert!(o.strip_metadata);
        assert_eq!((o.width, o.height), (None, None));
    }

    #[test]
    fn explicit_request_keeps_source_format() {
        let o = resolve_options(&query("?w=300"));
        assert_eq!(o.format, None);
        assert_eq!(o.max_edge, None);
        assert_eq!(o.quality.value(), 85);
        assert_eq!(o.width, Some(300));
    }

    #[test]
    fn explicit_quality_and_format_pass_through() {
        let o = resolve_options(&query("?q=40&format=png"));
        assert_eq!(o.quality.value(), 40);
        assert_eq!(o.format, Some(OutputFormat::Png));
    }

    #[test]
    fn thumbnail_becomes_square_cover() {
        let o = resolve_options(&query("?thumbnail=150"));
        assert_eq!((o.width, o.height), (Some(150), Some(150)));
        assert_eq!(o.crop, Fit::Cover);
    }

    #[test]
    fn thumbnail_ignored_when_width_given() {
        let o = resolve_options(&query("?thumbnail=150&w=90"));
        assert_eq!((o.width, o.height), (Some(90), None));
    }

    #[test]
    fn effects_are_carried() {
        let o = resolve_options(&query("?rotate=270&flip=v&blur=2&sharpen=1.5&grayscale"));
        assert_eq!(o.rotation, Rotation::R270);
        assert_eq!(o.flip, Some(crate::params::Flip::Vertical));
        assert_eq!(o.blur, Some(2.0));
        assert_eq!(o.sharpening, Some(Sharpening::with_radius(1.5)));
        assert!(o.grayscale);
    }

    #[test]
    fn compound_gravity_degrades_to_center() {
        for g in ["northeast", "northwest", "southeast", "southwest"] {
            let o = resolve_options(&query(&format!("?w=10&h=10&gravity={g}")));
            assert_eq!(o.anchor, Anchor::Center, "{g}");
        }
        assert_eq!(resolve_options(&query("?w=1&gravity=smart")).anchor, Anchor::Smart);
        assert_eq!(resolve_options(&query("?w=1&gravity=north")).anchor, Anchor::North);
    }

    // =========================================================================
    // Placeholder tests
    // =========================================================================

    #[test]
    fn placeholder_default_size() {
        assert_eq!(placeholder_dimensions(&TransformParams::default()), (400, 300));
    }

    #[test]
    fn placeholder_uses_requested_size() {
        assert_eq!(placeholder_dimensions(&query("?w=640&h=480")), (640, 480));
        assert_eq!(placeholder_dimensions(&query("?w=640")), (640, 300));
    }

    #[test]
    fn placeholder_floors_each_axis() {
        assert_eq!(placeholder_dimensions(&query("?w=20&h=5000")), (100, 5000));
        assert_eq!(placeholder_dimensions(&query("?preset=placeholder")), (100, 300));
    }

    #[test]
    fn placeholder_png_decodes_as_gray() {
        let bytes = placeholder_png(120, 100).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (120, 100));
        assert_eq!(img.get_pixel(60, 50).0, PLACEHOLDER_FILL);
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            image::ImageFormat::Png
        );
    }

    // =========================================================================
    // normalize_upload tests
    // =========================================================================

    const LIMITS: NormalizeLimits = NormalizeLimits {
        max_dimension: 4096,
        max_bytes: 1000,
    };

    #[test]
    fn normalize_within_limits_is_single_pass() {
        let backend = MockBackend::with_dimensions(800, 600);
        let out = normalize_upload(&backend, &[1u8; 500], OutputFormat::Jpeg, LIMITS).unwrap();
        assert_eq!(out.len(), 500);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[1],
            RecordedOp::Normalize(NormalizeOptions {
                max_width: 800,
                max_height: 600,
                format: OutputFormat::Jpeg,
                ..
            })
        ));
    }

    #[test]
    fn normalize_caps_dimension_ceiling() {
        let backend = MockBackend::with_dimensions(8000, 4000);
        normalize_upload(&backend, &[1u8; 10], OutputFormat::Png, LIMITS).unwrap();
        assert!(matches!(
            &backend.get_operations()[1],
            RecordedOp::Normalize(NormalizeOptions {
                max_width: 4096,
                max_height: 2048,
                ..
            })
        ));
    }

    #[test]
    fn normalize_shrinks_until_within_budget() {
        let backend = MockBackend::with_dimensions(1000, 1000);
        let out = normalize_upload(&backend, &[1u8; 4000], OutputFormat::Jpeg, LIMITS).unwrap();
        assert!(out.len() <= 1000, "got {} bytes", out.len());
        // identify + first encode + at least one shrink pass
        assert!(backend.get_operations().len() >= 3);
    }

    #[test]
    fn normalize_passes_animated_source_through() {
        let backend = MockBackend {
            animated: true,
            ..MockBackend::with_dimensions(8000, 4000)
        };
        let out = normalize_upload(&backend, &[7u8; 4000], OutputFormat::Gif, LIMITS).unwrap();
        assert_eq!(out, vec![7u8; 4000]);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn normalize_propagates_backend_failure() {
        let backend = MockBackend {
            dimensions: Some(crate::imaging::backend::Dimensions {
                width: 10,
                height: 10,
            }),
            ..MockBackend::failing()
        };
        assert!(normalize_upload(&backend, b"x", OutputFormat::Jpeg, LIMITS).is_err());
    }
}
