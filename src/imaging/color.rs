//! Colors and corner sampling.
//!
//! Corner colors are the cheap proxy for "what is this image's frame".
//! Ranking is by frequency, then by the color itself, both descending, so
//! a tie between two corner colors always resolves to the one with the
//! greater `(r, g, b)` tuple.

use image::{Rgb, RgbImage};
use std::fmt;

/// An 8-bit RGB triple, ordered lexicographically on `(r, g, b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0]);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// `#rrggbb`
    pub fn hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// True when any channel differs from `other` by more than `tolerance`.
    pub fn differs_from(self, other: Color, tolerance: u8) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .any(|(a, b)| a.abs_diff(*b) > tolerance)
    }
}

impl From<Rgb<u8>> for Color {
    fn from(px: Rgb<u8>) -> Self {
        Self(px.0)
    }
}

impl From<Color> for Rgb<u8> {
    fn from(c: Color) -> Self {
        Rgb(c.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// The four corner pixels of a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerColors {
    pub top_left: Color,
    pub top_right: Color,
    pub bottom_left: Color,
    pub bottom_right: Color,
}

impl CornerColors {
    /// `None` for an empty bitmap.
    pub fn sample(img: &RgbImage) -> Option<Self> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let at = |x, y| Color::from(*img.get_pixel(x, y));
        Some(Self {
            top_left: at(0, 0),
            top_right: at(w - 1, 0),
            bottom_left: at(0, h - 1),
            bottom_right: at(w - 1, h - 1),
        })
    }

    pub fn as_array(&self) -> [Color; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Distinct colors with their counts, most frequent first.
    pub fn ranked(&self) -> Vec<(Color, u32)> {
        let mut counts: Vec<(Color, u32)> = Vec::with_capacity(4);
        for color in self.as_array() {
            match counts.iter_mut().find(|(c, _)| *c == color) {
                Some((_, n)) => *n += 1,
                None => counts.push((color, 1)),
            }
        }
        counts.sort_by(|(ca, na), (cb, nb)| nb.cmp(na).then(cb.cmp(ca)));
        counts
    }

    pub fn most_common(&self) -> Color {
        // Four samples always yield at least one ranked color.
        self.ranked()
            .first()
            .map_or(self.top_left, |(color, _)| *color)
    }
}
