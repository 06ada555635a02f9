//! Pure geometry for trimming and thumbnailing.
//!
//! All functions here are pure and testable without any I/O or images.

/// A pixel rectangle with exclusive `right`/`bottom` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    /// The whole of a `width x height` bitmap.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Scale `source` down to fit inside `bounds`, preserving aspect ratio.
///
/// Never upscales; each side is at least 1px.
///
/// ```
/// # use playbill::imaging::fit_within;
/// assert_eq!(fit_within((1000, 500), (500, 400)), (500, 250));
/// assert_eq!(fit_within((300, 200), (500, 400)), (300, 200));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    if src_w <= max_w && src_h <= max_h {
        return source;
    }
    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}

/// Grow a detected content box back toward a target frame's aspect ratio.
///
/// Trimming to the exact content box can leave a sliver that no longer fills
/// the thumbnail frame. The box is padded so that, once scaled into
/// `frame`, it covers as much of it as the source allows:
///
/// - content narrower than the frame is padded to the frame width, and its
///   height to the frame height;
/// - otherwise the width is padded to `height * aspect`, and when that is
///   still under the frame width, to the frame width with the height padded
///   to the frame height.
///
/// Padding is split evenly between both sides. Whatever would overflow one
/// edge of the source is moved to the opposite edge, and the result is
/// clamped to the source.
pub fn expand_to_frame(content: BoundingBox, source: (u32, u32), frame: (u32, u32)) -> BoundingBox {
    let (src_w, src_h) = source;
    let (frame_w, frame_h) = frame;
    if frame_w == 0 || frame_h == 0 {
        return content;
    }
    let aspect = frame_w as f64 / frame_h as f64;
    let new_w = content.width() as f64;
    let new_h = content.height() as f64;

    let half_gap = |wanted: f64, have: f64| ((wanted - have) / 2.0).round().max(0.0) as u32;

    let (add_w, add_h) = if new_w < frame_w as f64 {
        (half_gap(frame_w as f64, new_w), half_gap(frame_h as f64, new_h))
    } else {
        let wanted_w = new_h * aspect;
        if wanted_w < frame_w as f64 {
            (half_gap(frame_w as f64, new_w), half_gap(frame_h as f64, new_h))
        } else {
            (half_gap(wanted_w, new_w), 0)
        }
    };

    let spill_left = add_w.saturating_sub(content.left);
    let spill_right = (content.right + add_w).saturating_sub(src_w);
    let spill_top = add_h.saturating_sub(content.top);
    let spill_bottom = (content.bottom + add_h).saturating_sub(src_h);

    BoundingBox {
        left: (content.left + spill_right).saturating_sub(add_w),
        top: (content.top + spill_bottom).saturating_sub(add_h),
        right: (content.right + add_w + spill_left).min(src_w),
        bottom: (content.bottom + add_h + spill_top).min(src_h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(left: u32, top: u32, right: u32, bottom: u32) -> BoundingBox {
        BoundingBox {
            left,
            top,
            right,
            bottom,
        }
    }

    // =========================================================================
    // BoundingBox
    // =========================================================================

    #[test]
    fn bbox_dimensions() {
        let b = bbox(10, 20, 110, 70);
        assert_eq!((b.width(), b.height(), b.area()), (100, 50, 5000));
        assert!(!b.is_empty());
        assert!(bbox(5, 5, 5, 9).is_empty());
    }

    // =========================================================================
    // fit_within
    // =========================================================================

    #[test]
    fn fit_landscape_limited_by_width() {
        assert_eq!(fit_within((1000, 500), (500, 400)), (500, 250));
    }

    #[test]
    fn fit_portrait_limited_by_height() {
        assert_eq!(fit_within((600, 1200), (500, 400)), (200, 400));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(fit_within((120, 80), (500, 400)), (120, 80));
    }

    #[test]
    fn fit_extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_within((10_000, 2), (500, 400)), (500, 1));
    }

    // =========================================================================
    // expand_to_frame
    // =========================================================================

    #[test]
    fn narrow_content_padded_to_frame() {
        // 200x100 content centred in a 1000x800 source, 500x400 frame
        let out = expand_to_frame(bbox(400, 350, 600, 450), (1000, 800), (500, 400));
        assert_eq!(out, bbox(250, 200, 750, 600));
    }

    #[test]
    fn wide_content_padded_to_aspect() {
        // 600x200 content, aspect 1.25 wants width 250 < 500, so frame wins
        let out = expand_to_frame(bbox(200, 300, 800, 500), (1000, 800), (500, 400));
        assert_eq!(out, bbox(200, 200, 800, 600));
    }

    #[test]
    fn tall_wide_content_padded_to_height_aspect() {
        // 600x600 content: wants width 750, pad 75 per side, height unchanged
        let out = expand_to_frame(bbox(200, 100, 800, 700), (1000, 800), (500, 400));
        assert_eq!(out, bbox(125, 100, 875, 700));
    }

    #[test]
    fn overflow_is_shifted_to_opposite_edge() {
        // content hugging the left edge: left padding spills to the right
        let out = expand_to_frame(bbox(0, 350, 200, 450), (1000, 800), (500, 400));
        assert_eq!(out, bbox(0, 200, 500, 600));
    }

    #[test]
    fn expansion_clamped_to_source() {
        let out = expand_to_frame(bbox(10, 10, 90, 60), (100, 70), (500, 400));
        assert_eq!(out, BoundingBox::full(100, 70));
    }

    #[test]
    fn degenerate_frame_leaves_box_unchanged() {
        let b = bbox(1, 2, 3, 4);
        assert_eq!(expand_to_frame(b, (10, 10), (0, 400)), b);
    }
}
