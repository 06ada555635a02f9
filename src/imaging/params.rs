//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`TrimParams`]: border detection tolerance and the optional frame that
//!   trimmed content is grown back toward.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Default per-channel difference below which a pixel counts as background.
pub const DEFAULT_TRIM_TOLERANCE: u8 = 25;

/// How border trimming decides what is frame and what is content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimParams {
    /// A pixel is content when any channel differs from the background by
    /// more than this. Absorbs JPEG noise along flat borders.
    pub tolerance: u8,
    /// `(max_width, max_height)` of the eventual thumbnail. When set, each
    /// content box is padded back toward this aspect ratio before cropping.
    pub frame: Option<(u32, u32)>,
}

impl Default for TrimParams {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TRIM_TOLERANCE,
            frame: None,
        }
    }
}

impl TrimParams {
    pub fn with_frame(max_width: u32, max_height: u32) -> Self {
        Self {
            frame: Some((max_width, max_height)),
            ..Self::default()
        }
    }
}
