//! Disk-backed memoization for expensive or flaky computations.
//!
//! Every remote read in the pipeline (ticketing pages, API listings, poster
//! downloads) goes through a [`CachedFn`]: a key template, a freshness
//! policy and a [`Codec`]. A call renders the key against its arguments,
//! serves the artifact at `<root>/<key>` when it is fresh and decodes to
//! something, and otherwise runs the computation and persists any present
//! result.
//!
//! ## Freshness
//!
//! | Situation | Outcome |
//! |---|---|
//! | no artifact on disk | stale |
//! | `reload` set | stale |
//! | no `max_age` | fresh forever |
//! | `mtime <= now - max_age` | stale |
//! | otherwise | fresh |
//!
//! An artifact modified exactly `max_age` ago is already stale.
//!
//! ## Failure handling
//!
//! The cache never makes a call fail that would have succeeded without it.
//! Unreadable or undecodable artifacts count as misses. A failed write is
//! logged and the computed value is still returned. Writes land in a
//! sibling temp file first and are renamed into place, so a crash mid-write
//! leaves either the old artifact or none.
//!
//! With `skip` set the cache is bypassed entirely: no reads, no writes.

pub mod codec;
pub mod key;

pub use codec::{Builder, BuilderCodec, Codec, HtmlCodec, JsonCodec, RawCodec, Records};
pub use key::{CallArgs, KeyTemplate, url_key, url_name};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};
use thiserror::Error;

const SECONDS_PER_DAY: u64 = 86_400;

/// Default artifact lifetime: one day.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(SECONDS_PER_DAY);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid key template {template:?}: {reason}")]
    Template { template: String, reason: String },
    #[error("key template {template:?} has no argument for {{{field}}}")]
    MissingArgument { template: String, field: String },
    #[error("cache key {0:?} escapes the cache root")]
    InvalidKey(String),
    #[error("cache {0:?} needs a builder to rebuild its records")]
    MissingBuilder(String),
    #[error("cached artifact rejected: {0}")]
    Build(String),
}

/// When a cached artifact may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// `None` means artifacts never expire.
    pub max_age: Option<Duration>,
    /// Treat every artifact as stale and refresh it.
    pub reload: bool,
    /// Bypass the cache: neither read nor write.
    pub skip: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: Some(DEFAULT_MAX_AGE),
            reload: false,
            skip: false,
        }
    }
}

impl CachePolicy {
    pub fn days(days: u32) -> Self {
        Self {
            max_age: Some(Duration::from_secs(u64::from(days) * SECONDS_PER_DAY)),
            ..Self::default()
        }
    }

    pub fn never_expire() -> Self {
        Self {
            max_age: None,
            ..Self::default()
        }
    }

    pub fn is_stale(&self, path: &Path) -> bool {
        self.is_stale_at(path, SystemTime::now())
    }

    pub fn is_stale_at(&self, path: &Path, now: SystemTime) -> bool {
        let Ok(meta) = fs::metadata(path) else {
            return true;
        };
        if !meta.is_file() || self.reload {
            return true;
        }
        let Some(max_age) = self.max_age else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return true;
        };
        match now.checked_sub(max_age) {
            Some(cutoff) => modified <= cutoff,
            None => false,
        }
    }
}

/// Hit/miss/write counters for one cached function.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    pub write_failures: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} computed ({} total)",
                self.hits,
                self.misses,
                self.total()
            )?;
        } else {
            write!(f, "{} computed", self.misses)?;
        }
        if self.write_failures > 0 {
            write!(f, ", {} not persisted", self.write_failures)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU32,
    misses: AtomicU32,
    write_failures: AtomicU32,
}

/// A memoized computation backed by one artifact per rendered key.
///
/// Safe to share between threads. Two concurrent misses for the same key
/// both compute; the last rename wins and either artifact is valid.
#[derive(Debug)]
pub struct CachedFn<C> {
    root: PathBuf,
    key: KeyTemplate,
    policy: CachePolicy,
    codec: C,
    counters: Counters,
}

impl<C: Codec> CachedFn<C> {
    pub fn new(root: impl Into<PathBuf>, key: KeyTemplate, codec: C) -> Self {
        Self {
            root: root.into(),
            key,
            policy: CachePolicy::default(),
            codec,
            counters: Counters::default(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn key(&self) -> &KeyTemplate {
        &self.key
    }

    /// Artifact location for a call.
    pub fn path_for(&self, args: &CallArgs) -> Result<PathBuf, CacheError> {
        Ok(self.root.join(self.key.render(args)?))
    }

    /// Serve the call from the cache or compute it.
    ///
    /// `compute` runs only on a miss. Its `Ok(None)` is returned as-is and
    /// never persisted; its errors propagate untouched.
    pub fn call<E, F>(&self, args: &CallArgs, compute: F) -> Result<Option<C::Value>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Result<Option<C::Value>, E>,
    {
        if self.policy.skip {
            return compute();
        }
        let path = self.path_for(args)?;
        if let Some(value) = self.read_fresh(&path) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let value = compute()?;
        if let Some(v) = &value
            && let Err(e) = self.write(&path, v)
        {
            self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(path = %path.display(), error = %e, "failed to persist cache artifact");
        }
        Ok(value)
    }

    /// Read a fresh artifact without computing anything on a miss.
    pub fn lookup(&self, args: &CallArgs) -> Result<Option<C::Value>, CacheError> {
        if self.policy.skip {
            return Ok(None);
        }
        Ok(self.read_fresh(&self.path_for(args)?))
    }

    /// Persist a value for a call, bypassing freshness checks.
    pub fn store(&self, args: &CallArgs, value: &C::Value) -> Result<PathBuf, CacheError> {
        let path = self.path_for(args)?;
        self.write(&path, value)?;
        Ok(path)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    fn read_fresh(&self, path: &Path) -> Option<C::Value> {
        if self.policy.is_stale(path) {
            tracing::debug!(path = %path.display(), "cache miss");
            return None;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache artifact");
                return None;
            }
        };
        match self.codec.decode(&bytes) {
            Ok(Some(value)) => {
                tracing::debug!(path = %path.display(), "cache hit");
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "empty cache artifact");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "undecodable cache artifact");
                None
            }
        }
    }

    fn write(&self, path: &Path, value: &C::Value) -> Result<(), CacheError> {
        let bytes = self.codec.encode(value)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut partial = path.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        fs::write(&partial, bytes)?;
        if let Err(e) = fs::rename(&partial, path) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        tracing::debug!(path = %path.display(), "cache write");
        Ok(())
    }
}

/// Factory for cached functions sharing one root and default policy.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    policy: CachePolicy,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: CachePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn json<T: Serialize + DeserializeOwned>(&self, key: KeyTemplate) -> CachedFn<JsonCodec<T>> {
        self.wrap(key, JsonCodec::new())
    }

    pub fn raw(&self, key: KeyTemplate) -> CachedFn<RawCodec> {
        self.wrap(key, RawCodec)
    }

    pub fn html(&self, key: KeyTemplate) -> CachedFn<HtmlCodec> {
        self.wrap(key, HtmlCodec)
    }

    /// Cache for domain records rebuilt through `builder` on read.
    ///
    /// Errors immediately when `builder` is `None`.
    pub fn built<T: Serialize>(
        &self,
        key: KeyTemplate,
        builder: Option<Arc<dyn Builder<T>>>,
    ) -> Result<CachedFn<BuilderCodec<T>>, CacheError> {
        let label = match &key {
            KeyTemplate::Fixed(s) | KeyTemplate::Template(s) | KeyTemplate::UrlSegment(s) => {
                s.clone()
            }
        };
        let codec = BuilderCodec::require(&label, builder)?;
        Ok(self.wrap(key, codec))
    }

    fn wrap<C: Codec>(&self, key: KeyTemplate, codec: C) -> CachedFn<C> {
        CachedFn::new(self.root.clone(), key, codec).with_policy(self.policy)
    }
}
