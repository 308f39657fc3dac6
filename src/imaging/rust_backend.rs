//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate (pure Rust decoders) |
//! | Auto-orient | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize / crop | `resize_exact` with `Lanczos3`, then `crop_imm` |
//! | Blur / sharpen | `DynamicImage::blur` / `DynamicImage::unsharpen` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` on RGB8 |
//! | Encode → WebP | `WebPEncoder::new_lossless` on RGBA8 (quality ignored) |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |
//! | Encode → PNG / GIF | `DynamicImage::write_to` |
//!
//! None of the encoders copy EXIF, ICC or XMP from the source, so every
//! output is metadata-free.
//!
//! The `image` crate only ships a lossless WebP encoder. WebP output,
//! including the web-defaults branch, is therefore lossless and the
//! requested quality has no effect on it. For photographic sources it can
//! be larger than a JPEG of the same pixels.
//!
//! Planned resizes over [`MAX_DIMENSION`](crate::params::MAX_DIMENSION) on
//! either axis fail with [`BackendError::ProcessingFailed`] before any
//! buffer is allocated.

use super::backend::{BackendError, Dimensions, ImageBackend, Transformed};
use super::calculations::{cap_longest_edge, plan_size};
use super::params::{NormalizeOptions, Quality, TransformOptions};
use crate::params::{Flip, OutputFormat, Rotation};
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::{WebPDecoder, WebPEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{
    AnimationDecoder, DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat,
    ImageReader,
};
use std::io::Cursor;

/// AVIF encoder speed (1 slowest .. 10 fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Output format matching a decoded container, if we can encode it.
fn output_format_of(format: ImageFormat) -> Option<OutputFormat> {
    match format {
        ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
        ImageFormat::Png => Some(OutputFormat::Png),
        ImageFormat::WebP => Some(OutputFormat::Webp),
        ImageFormat::Gif => Some(OutputFormat::Gif),
        ImageFormat::Avif => Some(OutputFormat::Avif),
        _ => None,
    }
}

/// Identify the encoding of `bytes` from its magic number.
pub fn sniff_format(bytes: &[u8]) -> Option<OutputFormat> {
    image::guess_format(bytes).ok().and_then(output_format_of)
}

fn decode_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Decode(e.to_string())
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Decode with EXIF orientation applied. Also reports the source container.
fn decode(bytes: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>), BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(decode_error)?;
    let format = reader.format();
    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    img.apply_orientation(orientation);
    Ok((img, format))
}

fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::R0 => img,
        Rotation::R90 => img.rotate90(),
        Rotation::R180 => img.rotate180(),
        Rotation::R270 => img.rotate270(),
    }
}

fn flip(img: DynamicImage, flip: Flip) -> DynamicImage {
    match flip {
        Flip::Horizontal => img.fliph(),
        Flip::Vertical => img.flipv(),
        Flip::Both => img.fliph().flipv(),
    }
}

/// Encode `img` as `format`. Quality applies to the lossy encoders only.
fn encode(img: &DynamicImage, format: OutputFormat, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality.value()).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Webp => {
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(&mut out).write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                ExtendedColorType::Rgba8,
            )
        }
        OutputFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, quality.value());
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
        }
        OutputFormat::Png => img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png),
        OutputFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Gif),
    };
    result.map_err(|e| BackendError::Encode {
        format,
        message: e.to_string(),
    })?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(decode_error)?;
        let mut decoder = reader.into_decoder().map_err(decode_error)?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        Ok(if swaps_axes(orientation) {
            Dimensions {
                width: height,
                height: width,
            }
        } else {
            Dimensions { width, height }
        })
    }

    fn transform(
        &self,
        bytes: &[u8],
        options: &TransformOptions,
    ) -> Result<Transformed, BackendError> {
        let (img, source) = decode(bytes)?;
        let format = options
            .format
            .or_else(|| source.and_then(output_format_of))
            .unwrap_or(OutputFormat::Jpeg);

        let mut img = rotate(img, options.rotation);
        if let Some(f) = options.flip {
            img = flip(img, f);
        }

        let plan = plan_size(
            (img.width(), img.height()),
            options.width,
            options.height,
            options.crop,
            options.anchor,
        );
        if !plan.within_limits() {
            return Err(BackendError::ProcessingFailed(format!(
                "planned resize {}x{} exceeds the dimension limit",
                plan.resize.0, plan.resize.1
            )));
        }
        if plan.resize != (img.width(), img.height()) {
            img = img.resize_exact(plan.resize.0, plan.resize.1, FilterType::Lanczos3);
        }
        if let Some((x, y, w, h)) = plan.crop {
            img = img.crop_imm(x, y, w, h);
        }

        if let Some(max_edge) = options.max_edge {
            let (w, h) = cap_longest_edge((img.width(), img.height()), max_edge);
            if (w, h) != (img.width(), img.height()) {
                img = img.resize_exact(w, h, FilterType::Lanczos3);
            }
        }

        if let Some(sigma) = options.blur {
            img = img.blur(sigma);
        }
        if let Some(sharpening) = options.sharpening {
            img = img.unsharpen(sharpening.sigma, sharpening.threshold);
        }
        if options.grayscale {
            img = img.grayscale();
        }

        let bytes = encode(&img, format, options.quality)?;
        Ok(Transformed { bytes, format })
    }

    fn is_animated(&self, bytes: &[u8]) -> Result<bool, BackendError> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Gif) => {
                let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(decode_error)?;
                let mut frames = 0;
                for frame in decoder.into_frames().take(2) {
                    frame.map_err(decode_error)?;
                    frames += 1;
                }
                Ok(frames > 1)
            }
            Ok(ImageFormat::WebP) => Ok(WebPDecoder::new(Cursor::new(bytes))
                .map_err(decode_error)?
                .has_animation()),
            _ => Ok(false),
        }
    }

    fn normalize(&self, bytes: &[u8], options: &NormalizeOptions) -> Result<Vec<u8>, BackendError> {
        let (mut img, _) = decode(bytes)?;
        if img.width() > options.max_width || img.height() > options.max_height {
            img = img.resize(options.max_width, options.max_height, FilterType::Lanczos3);
        }
        encode(&img, options.format, options.quality)
    }
}
