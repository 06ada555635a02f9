//! Shared test utilities for the playbill test suite.
//!
//! Provides synthetic bitmaps with known frames and a recording fake
//! [`Transport`] so fetch behavior can be asserted call by call.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let img = bordered(100, 80, 10, Color::WHITE, Color::BLACK);
//! let transport = FakeTransport::new()
//!     .with_status(URL, 404)
//!     .with_snapshot(URL, "20240102030405", &png_bytes(&img));
//! // ... run a fetch ...
//! assert_eq!(transport.call_count(), 2);
//! ```

use crate::fetch::{FetchError, Snapshot, Transport, WaybackArchive};
use crate::imaging::Color;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

// =========================================================================
// Synthetic bitmaps
// =========================================================================

pub fn solid(width: u32, height: u32, color: Color) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color.0))
}

/// `content` surrounded by a `border`-pixel `frame` on every side.
pub fn bordered(width: u32, height: u32, border: u32, frame: Color, content: Color) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let inside = x >= border && y >= border && x < width - border && y < height - border;
        Rgb(if inside { content.0 } else { frame.0 })
    })
}

/// An `outer` frame, then an `inner` mat, then `content`.
pub fn double_bordered(
    width: u32,
    height: u32,
    outer: u32,
    outer_color: Color,
    inner: u32,
    inner_color: Color,
    content: Color,
) -> RgbImage {
    let mat = bordered(width - 2 * outer, height - 2 * outer, inner, inner_color, content);
    RgbImage::from_fn(width, height, |x, y| {
        let in_mat = x >= outer && y >= outer && x < width - outer && y < height - outer;
        if in_mat {
            *mat.get_pixel(x - outer, y - outer)
        } else {
            Rgb(outer_color.0)
        }
    })
}

/// Four mutually distinct corner colors over a gradient.
pub fn four_corner_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(2).saturating_sub(1)) as u8,
            (y * 255 / height.max(2).saturating_sub(1)) as u8,
            128,
        ])
    })
}

pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// =========================================================================
// Fake transport
// =========================================================================

/// Transport answering from a fixed route table and recording every URL
/// requested. Unrouted URLs fail with a network error.
///
/// Uses Mutex (not RefCell) so it is Sync and works behind `Arc<dyn Transport>`.
#[derive(Default)]
pub struct FakeTransport {
    routes: HashMap<String, Result<Vec<u8>, u16>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.routes.insert(url.to_string(), Ok(body.to_vec()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(url.to_string(), Err(status));
        self
    }

    /// Route the archive lookup for `url` to a snapshot at `timestamp`
    /// whose raw bytes are `body`.
    pub fn with_snapshot(self, url: &str, timestamp: &str, body: &[u8]) -> Self {
        let snapshot = Snapshot {
            original: url.to_string(),
            timestamp: timestamp.to_string(),
            url: format!("http://web.archive.org/web/{timestamp}/{url}"),
        };
        let availability = serde_json::json!({
            "url": url,
            "archived_snapshots": {
                "closest": {
                    "available": true,
                    "url": snapshot.url.clone(),
                    "timestamp": timestamp,
                    "status": "200",
                }
            }
        });
        let lookup = lookup_url(url);
        self.with_body(&lookup, availability.to_string().as_bytes())
            .with_body(&snapshot.raw_url(), body)
    }

    /// Route the archive lookup for `url` to "nothing archived".
    pub fn with_no_snapshot(self, url: &str) -> Self {
        let lookup = lookup_url(url);
        self.with_body(&lookup, br#"{"archived_snapshots": {}}"#)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.routes.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Network {
                url: url.to_string(),
                reason: "connection refused".into(),
            }),
        }
    }
}

fn lookup_url(url: &str) -> String {
    WaybackArchive::default().lookup_url(url).unwrap()
}
