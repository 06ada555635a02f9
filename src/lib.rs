//! # Playbill
//!
//! The acquisition layer of a ticketing-site feed builder: it fetches
//! show posters through the web archive, memoizes every expensive step on
//! disk, and turns raw images into framed thumbnails.
//!
//! # Architecture
//!
//! ```text
//! URL ──▶ ResilientFetcher ──▶ ImageHandle ──▶ trim ──▶ thumbnail ──▶ save
//!          (archive → origin)    (lazy decode,     (two-pass border removal)
//!          └─ CachedFn on disk    provenance chain)
//! ```
//!
//! Three ideas carry the design:
//!
//! - **Disk memoization**: [`cache::CachedFn`] wraps any fallible computation,
//!   deriving a file path from its arguments. A fresh artifact is reused; a
//!   stale, missing or corrupt one is recomputed. Writing it back is best-effort.
//! - **Archive first**: [`fetch::ResilientFetcher`] prefers the closest
//!   archived snapshot and retries a bounded number of rounds before falling
//!   back to the origin, so flaky ticketing sites do not stall a batch.
//! - **Handles, not errors**: [`imaging::ImageHandle`] absorbs fetch and
//!   decode failures into a KO state. Everything downstream sees `Option`,
//!   and one bad poster never aborts a run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`cache`] | Key templates, codecs, staleness policy and the memoizing wrapper |
//! | [`fetch`] | Transport abstraction, web archive lookup, retrying fetcher |
//! | [`imaging`] | Image handles, corner sampling, border trimming, thumbnails, OCR |
//! | [`process`] | Parallel batch driver producing a JSON report |
//! | [`config`] | `config.toml` loading, validation and stock defaults |
//! | [`logging`] | `tracing` subscriber setup for the binary |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Blocking I/O on a Thread Pool
//!
//! Acquisition is a batch step: hundreds of posters, each needing a couple of
//! HTTP round trips and some pixel work. A `rayon` pool with a blocking
//! `reqwest` client keeps the code synchronous and easy to test. Jobs are
//! grouped by URL before dispatch, so no two workers ever race on the same
//! cache file.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, cropping, resizing and encoding all use the `image` crate. The
//! only external program is the optional `tesseract` binary for OCR, reached
//! through [`imaging::TextRecognizer`] so it can be faked in tests.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod process;

#[cfg(test)]
pub(crate) mod test_helpers;
