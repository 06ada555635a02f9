//! Border trimming: remove a solid-color frame or letterbox.
//!
//! ## Algorithm
//!
//! 1. Rank the four corner colors by frequency (see [`CornerColors::ranked`]).
//! 2. **Pass one**: treat the top color as background and find the bounding
//!    box of every pixel that differs from it by more than the tolerance.
//!    No box (uniform image) or a full-size box (no frame) means the pass
//!    changes nothing; otherwise crop to the box, optionally grown toward
//!    the thumbnail frame.
//! 3. **Pass two** runs only when the corners split two-and-two: the second
//!    color is trimmed from the pass-one result (or from the original if pass
//!    one changed nothing). This catches a frame whose top and bottom bands
//!    differ, which a single dominant color would leave half-removed.
//! 4. The result's background is the color of whichever pass removed more
//!    area; on a tie, pass one's.
//!
//! A frame nested inside another frame of the same corner color (a mat
//! inside a border) is peeled one layer per call; trimming the result again
//! removes the next layer.

use super::calculations::{BoundingBox, expand_to_frame};
use super::color::{Color, CornerColors};
use super::params::TrimParams;
use image::RgbImage;
use image::imageops;

/// Output of a successful trim.
#[derive(Debug, Clone)]
pub struct Trimmed {
    pub bitmap: RgbImage,
    /// Color of the frame that accounts for the larger removed area.
    pub background: Color,
    /// Pixels removed across all passes.
    pub removed_area: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BorderTrimmer {
    params: TrimParams,
}

impl BorderTrimmer {
    pub fn new(params: TrimParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrimParams {
        &self.params
    }

    /// Bounding box of every pixel that is not `background`, or `None` when
    /// the whole image is background.
    pub fn content_box(&self, img: &RgbImage, background: Color) -> Option<BoundingBox> {
        let mut found: Option<BoundingBox> = None;
        for (x, y, px) in img.enumerate_pixels() {
            if !Color::from(*px).differs_from(background, self.params.tolerance) {
                continue;
            }
            let b = found.get_or_insert(BoundingBox {
                left: x,
                top: y,
                right: x + 1,
                bottom: y + 1,
            });
            b.left = b.left.min(x);
            b.top = b.top.min(y);
            b.right = b.right.max(x + 1);
            b.bottom = b.bottom.max(y + 1);
        }
        found
    }

    /// Trim `img`, or `None` when no pass found a frame.
    pub fn trim(&self, img: &RgbImage) -> Option<Trimmed> {
        let corners = CornerColors::sample(img)?;
        let ranked = corners.ranked();
        let &(first, first_count) = ranked.first()?;

        let mut best = self.pass(img, first).map(|bitmap| Trimmed {
            removed_area: area(img) - area(&bitmap),
            bitmap,
            background: first,
        });

        if first_count < 2 {
            return best;
        }
        let Some(&(second, second_count)) = ranked.get(1) else {
            return best;
        };
        if second_count < 2 {
            return best;
        }

        let candidate = best.as_ref().map_or(img, |t| &t.bitmap);
        let Some(bitmap) = self.pass(candidate, second) else {
            return best;
        };
        let removed_one = best.as_ref().map_or(0, |t| t.removed_area);
        let removed_two = area(candidate) - area(&bitmap);
        let background = if removed_two > removed_one {
            second
        } else {
            first
        };
        tracing::debug!(
            first = %first,
            second = %second,
            removed_one,
            removed_two,
            "two-pass trim"
        );
        best = Some(Trimmed {
            bitmap,
            background,
            removed_area: removed_one + removed_two,
        });
        best
    }

    fn pass(&self, img: &RgbImage, background: Color) -> Option<RgbImage> {
        let (width, height) = img.dimensions();
        let full = BoundingBox::full(width, height);
        let Some(content) = self.content_box(img, background) else {
            tracing::warn!(background = %background, "uniform image, nothing to trim");
            return None;
        };
        if content == full {
            tracing::warn!(background = %background, "no frame detected");
            return None;
        }
        let crop = match self.params.frame {
            Some(frame) => expand_to_frame(content, (width, height), frame),
            None => content,
        };
        if crop == full || crop.is_empty() {
            return None;
        }
        Some(imageops::crop_imm(img, crop.left, crop.top, crop.width(), crop.height()).to_image())
    }
}

fn area(img: &RgbImage) -> u64 {
    u64::from(img.width()) * u64::from(img.height())
}
