//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Anchor;
use crate::params::{Fit, MAX_DIMENSION};

/// What to do with the pixels to honour a fit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePlan {
    /// Dimensions to resize the source to.
    pub resize: (u32, u32),
    /// Final crop `(x, y, width, height)` taken from the resized image.
    pub crop: Option<(u32, u32, u32, u32)>,
}

impl SizePlan {
    fn resize_only(resize: (u32, u32)) -> Self {
        Self { resize, crop: None }
    }

    /// Whether the intermediate resize stays within [`MAX_DIMENSION`] per axis.
    pub fn within_limits(&self) -> bool {
        self.resize.0 <= MAX_DIMENSION && self.resize.1 <= MAX_DIMENSION
    }

    /// Dimensions of the image after the plan is applied.
    #[cfg(test)]
    pub fn output(&self) -> (u32, u32) {
        match self.crop {
            Some((_, _, w, h)) => (w, h),
            None => self.resize,
        }
    }
}

fn scaled(value: u32, ratio: f64) -> u32 {
    ((value as f64 * ratio).round() as u32).max(1)
}

fn bounded(resize: (u32, u32)) -> SizePlan {
    SizePlan::resize_only(cap_longest_edge(resize, MAX_DIMENSION))
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Largest dimensions with the source aspect ratio that fit inside `target`.
pub fn calculate_contain_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let ratio = (target.0 as f64 / source.0 as f64).min(target.1 as f64 / source.1 as f64);
    (
        scaled(source.0, ratio).min(target.0),
        scaled(source.1, ratio).min(target.1),
    )
}

/// Top-left corner of a `target`-sized window inside `resized`, placed by `anchor`.
pub fn crop_origin(resized: (u32, u32), target: (u32, u32), anchor: Anchor) -> (u32, u32) {
    let spare_x = resized.0.saturating_sub(target.0);
    let spare_y = resized.1.saturating_sub(target.1);
    let (cx, cy) = (spare_x / 2, spare_y / 2);
    match anchor {
        Anchor::Center | Anchor::Smart => (cx, cy),
        Anchor::North => (cx, 0),
        Anchor::South => (cx, spare_y),
        Anchor::West => (0, cy),
        Anchor::East => (spare_x, cy),
    }
}

/// Plan resizing `source` toward an optional `width`×`height` box.
///
/// | Request | Result |
/// |---|---|
/// | neither side | unchanged |
/// | one side | that side matches, other follows the aspect ratio |
/// | `fill` | exactly `width`×`height`, aspect ignored |
/// | `cover` | fill the box, then crop to it at `anchor` |
/// | `contain` | largest fit inside the box (may enlarge) |
/// | `inside` | like `contain`, but never enlarges |
/// | `outside` | smallest cover of the box, no crop |
///
/// The aspect-following axis of a one-sided request and the overflow of
/// `outside` are capped at [`MAX_DIMENSION`], shrinking both sides to keep
/// the aspect ratio. A `cover` plan on an extreme aspect ratio can still
/// exceed it; check [`SizePlan::within_limits`] before allocating.
pub fn plan_size(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    fit: Fit,
    anchor: Anchor,
) -> SizePlan {
    let (src_w, src_h) = source;
    match (width, height) {
        (None, None) => SizePlan::resize_only(source),
        (Some(w), None) => bounded((w, scaled(src_h, w as f64 / src_w as f64))),
        (None, Some(h)) => bounded((scaled(src_w, h as f64 / src_h as f64), h)),
        (Some(w), Some(h)) => match fit {
            Fit::Fill => SizePlan::resize_only((w, h)),
            Fit::Contain => SizePlan::resize_only(calculate_contain_dimensions(source, (w, h))),
            Fit::Inside => {
                if src_w <= w && src_h <= h {
                    SizePlan::resize_only(source)
                } else {
                    SizePlan::resize_only(calculate_contain_dimensions(source, (w, h)))
                }
            }
            Fit::Outside => bounded(calculate_fill_dimensions(source, (w, h))),
            Fit::Cover => {
                let resize = calculate_fill_dimensions(source, (w, h));
                let (x, y) = crop_origin(resize, (w, h), anchor);
                SizePlan {
                    resize,
                    crop: Some((x, y, w, h)),
                }
            }
        },
    }
}

/// Shrink `dims` so the longer edge is at most `max_edge`. Never enlarges.
pub fn cap_longest_edge(dims: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = dims;
    let longer = w.max(h);
    if longer <= max_edge {
        return dims;
    }
    let ratio = max_edge as f64 / longer as f64;
    if w >= h {
        (max_edge, scaled(h, ratio))
    } else {
        (scaled(w, ratio), max_edge)
    }
}

/// Next dimensions to try when an encoded image of `encoded_len` bytes
/// exceeds `budget` bytes.
///
/// Encoded size grows roughly with pixel count, so each edge shrinks by
/// `sqrt(budget / encoded_len)`. Always shrinks by at least one pixel on the
/// longer edge so repeated calls make progress.
pub fn downscale_for_budget(dims: (u32, u32), encoded_len: u64, budget: u64) -> (u32, u32) {
    if encoded_len <= budget || encoded_len == 0 {
        return dims;
    }
    let ratio = (budget as f64 / encoded_len as f64).sqrt();
    let (w, h) = (scaled(dims.0, ratio), scaled(dims.1, ratio));
    if w.max(h) >= dims.0.max(dims.1) {
        cap_longest_edge(dims, dims.0.max(dims.1).saturating_sub(1).max(1))
    } else {
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_fill_dimensions tests
    // =========================================================================

    #[test]
    fn fill_wider_source_to_portrait_target() {
        // 800x600 (4:3) → 400x500 target
        // Source is wider, so height matches: 500, width = 500 * (4/3) = 667
        assert_eq!(calculate_fill_dimensions((800, 600), (400, 500)), (667, 500));
    }

    #[test]
    fn fill_taller_source_to_landscape_target() {
        assert_eq!(calculate_fill_dimensions((600, 800), (500, 400)), (500, 667));
    }

    #[test]
    fn fill_same_aspect_ratio() {
        assert_eq!(calculate_fill_dimensions((800, 600), (400, 300)), (400, 300));
    }

    // =========================================================================
    // plan_size tests
    // =========================================================================

    #[test]
    fn no_target_keeps_source() {
        let plan = plan_size((640, 480), None, None, Fit::Cover, Anchor::Center);
        assert_eq!(plan.output(), (640, 480));
        assert_eq!(plan.crop, None);
    }

    #[test]
    fn width_only_preserves_aspect() {
        let plan = plan_size((2000, 1500), Some(1000), None, Fit::Cover, Anchor::Center);
        assert_eq!(plan.output(), (1000, 750));
    }

    #[test]
    fn height_only_preserves_aspect() {
        let plan = plan_size((1500, 2000), None, Some(1000), Fit::Cover, Anchor::Center);
        assert_eq!(plan.output(), (750, 1000));
    }

    #[test]
    fn cover_crops_to_exact_box() {
        let plan = plan_size((800, 600), Some(300), Some(300), Fit::Cover, Anchor::Center);
        assert_eq!(plan.resize, (400, 300));
        assert_eq!(plan.crop, Some((50, 0, 300, 300)));
        assert_eq!(plan.output(), (300, 300));
    }

    #[test]
    fn cover_respects_anchor() {
        let west = plan_size((800, 600), Some(300), Some(300), Fit::Cover, Anchor::West);
        let east = plan_size((800, 600), Some(300), Some(300), Fit::Cover, Anchor::East);
        assert_eq!(west.crop, Some((0, 0, 300, 300)));
        assert_eq!(east.crop, Some((100, 0, 300, 300)));
    }

    #[test]
    fn fill_stretches() {
        let plan = plan_size((800, 600), Some(100), Some(400), Fit::Fill, Anchor::Center);
        assert_eq!(plan.output(), (100, 400));
    }

    #[test]
    fn contain_may_enlarge_but_inside_does_not() {
        let contain = plan_size((100, 50), Some(400), Some(400), Fit::Contain, Anchor::Center);
        let inside = plan_size((100, 50), Some(400), Some(400), Fit::Inside, Anchor::Center);
        assert_eq!(contain.output(), (400, 200));
        assert_eq!(inside.output(), (100, 50));
    }

    #[test]
    fn inside_shrinks_large_sources() {
        let plan = plan_size((1600, 900), Some(800), Some(800), Fit::Inside, Anchor::Center);
        assert_eq!(plan.output(), (800, 450));
    }

    #[test]
    fn outside_covers_without_crop() {
        let plan = plan_size((800, 600), Some(300), Some(300), Fit::Outside, Anchor::Center);
        assert_eq!(plan.output(), (400, 300));
        assert_eq!(plan.crop, None);
    }

    #[test]
    fn width_only_on_sliver_is_capped() {
        // 1x4096 at w=8192 would otherwise plan 8192x33554432.
        let plan = plan_size((1, 4096), Some(8192), None, Fit::Cover, Anchor::Center);
        assert_eq!(plan.output(), (2, 8192));
        assert!(plan.within_limits());
    }

    #[test]
    fn height_only_on_sliver_is_capped() {
        let plan = plan_size((4096, 1), None, Some(8192), Fit::Cover, Anchor::Center);
        assert_eq!(plan.output(), (8192, 2));
    }

    #[test]
    fn outside_is_capped() {
        let plan = plan_size((1, 4096), Some(8192), Some(100), Fit::Outside, Anchor::Center);
        assert!(plan.within_limits());
        assert_eq!(plan.resize.1, MAX_DIMENSION);
    }

    #[test]
    fn extreme_cover_reports_over_limit() {
        let plan = plan_size((1, 4096), Some(8192), Some(100), Fit::Cover, Anchor::Center);
        assert!(!plan.within_limits());
    }

    #[test]
    fn tiny_scale_never_reaches_zero() {
        let plan = plan_size((10000, 10), Some(100), None, Fit::Cover, Anchor::Center);
        assert_eq!(plan.output(), (100, 1));
    }

    // =========================================================================
    // crop_origin tests
    // =========================================================================

    #[test]
    fn crop_origin_vertical_anchors() {
        assert_eq!(crop_origin((300, 500), (300, 300), Anchor::North), (0, 0));
        assert_eq!(crop_origin((300, 500), (300, 300), Anchor::South), (0, 200));
        assert_eq!(crop_origin((300, 500), (300, 300), Anchor::Center), (0, 100));
        assert_eq!(crop_origin((300, 500), (300, 300), Anchor::Smart), (0, 100));
    }

    // =========================================================================
    // cap_longest_edge / downscale_for_budget tests
    // =========================================================================

    #[test]
    fn cap_landscape() {
        assert_eq!(cap_longest_edge((4096, 3072), 2048), (2048, 1536));
    }

    #[test]
    fn cap_portrait() {
        assert_eq!(cap_longest_edge((3000, 6000), 2048), (1024, 2048));
    }

    #[test]
    fn cap_never_enlarges() {
        assert_eq!(cap_longest_edge((800, 600), 2048), (800, 600));
    }

    #[test]
    fn budget_within_limit_is_unchanged() {
        assert_eq!(downscale_for_budget((1000, 800), 100, 200), (1000, 800));
    }

    #[test]
    fn budget_uses_square_root_of_ratio() {
        // 4x over budget → each edge halves
        assert_eq!(downscale_for_budget((1000, 800), 400, 100), (500, 400));
    }

    #[test]
    fn budget_always_makes_progress() {
        let next = downscale_for_budget((1000, 800), 101, 100);
        assert!(next.0 < 1000);
    }
}
