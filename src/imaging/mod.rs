//! Image acquisition and normalization, in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory`, normalized to RGB8 |
//! | **Corner sampling** | four `get_pixel` reads |
//! | **Trim** | per-pixel tolerance scan + `imageops::crop_imm` |
//! | **Thumbnail** | `imageops::resize` with `Lanczos3`, fit-within, no upscaling |
//! | **Save** | JPEG / PNG / WebP / AVIF encoders from `image` |
//! | **OCR** | `tesseract` CLI behind [`TextRecognizer`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for box and dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Color / Trim**: Corner sampling and the border-removal algorithm
//! - **Encode / OCR**: Bitmap I/O and text recognition
//! - **Handle**: [`ImageHandle`], lazy decoding plus provenance, tying it all together

mod calculations;
pub mod color;
pub mod encode;
pub mod handle;
pub mod ocr;
mod params;
pub mod trim;

pub use calculations::{BoundingBox, expand_to_frame, fit_within};
pub use color::{Color, CornerColors};
pub use encode::{ImagingError, OutputFormat};
pub use handle::{ImageHandle, ImageServices, ImageSource, Orientation, TrimRecord};
pub use ocr::{OcrError, TesseractCli, TextRecognizer};
pub use params::{DEFAULT_TRIM_TOLERANCE, Quality, TrimParams};
pub use trim::{BorderTrimmer, Trimmed};
