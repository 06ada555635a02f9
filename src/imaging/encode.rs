//! Decoding and encoding bitmaps.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` / `ImageReader` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the requested quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless, quality ignored) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless, quality ignored) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Everything decoded is normalized to 8-bit RGB, so alpha is dropped and
//! grayscale is expanded.

use super::params::Quality;
use image::{DynamicImage, ImageReader, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("unsupported output format: {0:?}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> Result<Self, ImagingError> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "avif" => Ok(Self::Avif),
            other => Err(ImagingError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ImagingError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }
}

pub fn decode_bytes(bytes: &[u8]) -> Result<RgbImage, ImagingError> {
    let img = image::load_from_memory(bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;
    Ok(img.into_rgb8())
}

pub fn load_path(path: &Path) -> Result<RgbImage, ImagingError> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ImagingError::Decode(format!("{}: {e}", path.display())))?;
    Ok(img.into_rgb8())
}

/// Encode `img` to `path`, picking the format from the extension.
///
/// Parent directories are created as needed. The image is encoded into a
/// sibling `.partial` file and renamed into place, so a failed encode never
/// leaves a truncated file at `path`.
pub fn save(img: &RgbImage, path: &Path, quality: Quality) -> Result<(), ImagingError> {
    let format = OutputFormat::from_path(path)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    let written = encode_to(img, &partial, format, quality)
        .map_err(|e| match e {
            ImagingError::Encode(reason) => {
                ImagingError::Encode(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
        .and_then(|()| std::fs::rename(&partial, path).map_err(ImagingError::from));
    if written.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    written
}

fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    PathBuf::from(partial)
}

fn encode_to(
    img: &RgbImage,
    path: &Path,
    format: OutputFormat,
    quality: Quality,
) -> Result<(), ImagingError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let result = match format {
        OutputFormat::Jpeg => {
            let q = quality.value() as u8;
            dynamic.write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut writer,
                q,
            ))
        }
        OutputFormat::Png => {
            dynamic.write_with_encoder(image::codecs::png::PngEncoder::new(&mut writer))
        }
        OutputFormat::WebP => dynamic.write_with_encoder(
            image::codecs::webp::WebPEncoder::new_lossless(&mut writer),
        ),
        OutputFormat::Avif => {
            dynamic.write_with_encoder(image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut writer,
                6,
                quality.value() as u8,
            ))
        }
    };
    result.map_err(|e| ImagingError::Encode(e.to_string()))?;
    writer.flush()?;
    Ok(())
}
