//! Text recognition over decoded bitmaps.
//!
//! Recognition sits behind [`TextRecognizer`] so the handle's lazy `text()`
//! can be exercised without an OCR engine installed. The production
//! implementation shells out to the `tesseract` CLI, piping a PNG on stdin
//! and reading plain text from stdout.

use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("failed to prepare bitmap: {0}")]
    Encode(String),
}

pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, img: &RgbImage) -> Result<String, OcrError>;
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractCli {
    pub program: String,
    pub language: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            program: "tesseract".into(),
            language: "spa".into(),
        }
    }
}

impl TesseractCli {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "stdin".into(),
            "stdout".into(),
            "-l".into(),
            self.language.clone(),
        ]
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, img: &RgbImage) -> Result<String, OcrError> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrError::Encode(e.to_string()))?;

        let spawn_err = |source: std::io::Error| OcrError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;
        if !output.status.success() {
            return Err(OcrError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(normalize_text(&String::from_utf8_lossy(&output.stdout)))
    }
}
