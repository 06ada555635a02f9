//! Resilient acquisition of remote bytes.
//!
//! [`ResilientFetcher::fetch`] resolves a URL in this order:
//!
//! 1. **Cache**: a fresh artifact keyed by the URL's last path segment
//!    short-circuits the network entirely.
//! 2. **Direct mode**: fetch the origin once and return.
//! 3. **Archive**: look up the closest web-archive snapshot and fetch its
//!    raw bytes. Transient failures and missing snapshots are retried after
//!    a fixed delay, up to `retries` extra rounds.
//! 4. **Last resort**: one unprotected fetch of the origin. Its failure is
//!    the terminal error.
//!
//! Every successful fetch is written to the cache before returning.
//!
//! The direct/archive choice is a constructor setting, resolved once from
//! configuration; nothing here reads the environment.

pub mod archive;
pub mod transport;

pub use archive::{Snapshot, WaybackArchive};
pub use transport::{HttpTransport, Transport};

use crate::cache::{CacheError, CacheStats, CachedFn, CallArgs, KeyTemplate, RawCodec};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Cache key template for downloaded bytes.
pub const IMAGE_CACHE_KEY: &str = "img/{}";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("archive lookup for {url} failed: {reason}")]
    Archive { url: String, reason: String },
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Archive { .. } => true,
            Self::Status { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            Self::Cache(_) => false,
        }
    }
}

/// Anything that turns a URL into bytes.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// Skip the archive and fetch origins directly.
    pub direct: bool,
    /// Extra archive rounds after the first one.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            direct: false,
            retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    archive: WaybackArchive,
    cache: CachedFn<RawCodec>,
    settings: FetchSettings,
}

impl ResilientFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        archive: WaybackArchive,
        cache: CachedFn<RawCodec>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            transport,
            archive,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn fetch_uncached(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.settings.direct {
            tracing::debug!(url, "direct fetch");
            return self.transport.get(url);
        }

        let mut remaining = self.settings.retries;
        loop {
            match self.archive.closest(self.transport.as_ref(), url) {
                Ok(Some(snapshot)) => {
                    tracing::debug!(url, timestamp = %snapshot.timestamp, "fetching archived snapshot");
                    match self.transport.get(&snapshot.raw_url()) {
                        Ok(bytes) => return Ok(bytes),
                        Err(e) if e.is_transient() && remaining > 0 => {
                            tracing::warn!(url, error = %e, remaining, "archived fetch failed, retrying");
                        }
                        Err(e) => {
                            tracing::warn!(url, error = %e, "archived fetch failed");
                            break;
                        }
                    }
                }
                Ok(None) if remaining > 0 => {
                    tracing::debug!(url, remaining, "no archived snapshot, retrying");
                }
                Ok(None) => break,
                Err(e) if e.is_transient() && remaining > 0 => {
                    tracing::warn!(url, error = %e, remaining, "archive lookup failed, retrying");
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "archive lookup failed");
                    break;
                }
            }
            remaining -= 1;
            thread::sleep(self.settings.retry_delay);
        }

        tracing::debug!(url, "falling back to origin");
        self.transport.get(url)
    }
}

impl Fetch for ResilientFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .cache
            .call(&CallArgs::one(url), || self.fetch_uncached(url).map(Some))?;
        bytes.ok_or_else(|| FetchError::Network {
            url: url.to_string(),
            reason: "empty response".into(),
        })
    }
}

/// Byte cache for downloads under `root`, keyed per full URL via [`crate::cache::url_key`].
pub fn download_cache(root: impl Into<std::path::PathBuf>) -> CachedFn<RawCodec> {
    CachedFn::new(root, KeyTemplate::url_segment(IMAGE_CACHE_KEY), RawCodec)
}
