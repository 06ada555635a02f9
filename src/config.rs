//! Playbill configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user `config.toml` overrides any subset of keys.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! cache_root = ".playbill-cache"  # Root of every cached artifact
//!
//! [cache]
//! max_age_days = 1          # Lifetime of structured cache artifacts
//! expire = true             # false = artifacts never expire
//!
//! [fetch]
//! direct = false            # true = skip the web archive, fetch origins
//! retries = 3               # Extra archive rounds after the first
//! retry_delay_secs = 5      # Fixed delay between rounds
//! timeout_secs = 30         # Per-request transport timeout
//! archive_endpoint = "https://archive.org/wayback/available"
//! user_agent = "playbill/0.4"
//! cache_expire = false      # Downloaded bytes never expire by default
//! cache_max_age_days = 30
//!
//! [images]
//! max_width = 500           # Thumbnail frame
//! max_height = 400
//! quality = 90              # Lossy encoding quality (1-100)
//! trim_tolerance = 25       # Per-channel difference still counted as frame
//! fit_to_frame = true       # Grow trimmed content back toward the frame aspect
//! format = "jpg"            # jpg, png, webp or avif
//!
//! [ocr]
//! enabled = false
//! program = "tesseract"
//! language = "spa"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [logging]
//! level = "info"            # Overridden by PLAYBILL_LOG
//! ```
//!
//! ## Environment
//!
//! `PLAYBILL_DIRECT_FETCH` (`1`/`true`/`yes` or `0`/`false`/`no`) overrides
//! `fetch.direct`. It is read once by [`PlaybillConfig::apply_env_overrides`]
//! and from then on travels inside the config like any other value.
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::CachePolicy;
use crate::fetch::FetchSettings;
use crate::imaging::{OutputFormat, Quality, TrimParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `fetch.direct`.
pub const DIRECT_FETCH_ENV: &str = "PLAYBILL_DIRECT_FETCH";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Playbill configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybillConfig {
    /// Root directory for cache artifacts.
    pub cache_root: String,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub images: ImagesConfig,
    pub ocr: OcrConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

impl Default for PlaybillConfig {
    fn default() -> Self {
        Self {
            cache_root: ".playbill-cache".to_string(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            images: ImagesConfig::default(),
            ocr: OcrConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PlaybillConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cache_root must not be empty".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.max_width == 0 || self.images.max_height == 0 {
            return Err(ConfigError::Validation(
                "images.max_width and images.max_height must be non-zero".into(),
            ));
        }
        OutputFormat::from_extension(&self.images.format).map_err(|_| {
            ConfigError::Validation(format!(
                "images.format must be jpg, png, webp or avif (got {:?})",
                self.images.format
            ))
        })?;
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be non-zero".into(),
            ));
        }
        if self.ocr.enabled && self.ocr.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ocr.program must be set when OCR is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(DIRECT_FETCH_ENV) {
            self.fetch.direct = parse_flag(&raw).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "{DIRECT_FETCH_ENV} must be 1/true/yes or 0/false/no (got {raw:?})"
                ))
            })?;
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Staleness of structured cache artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_age_days: u32,
    /// When false, artifacts never expire.
    pub expire: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_days: 1,
            expire: true,
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        policy_for(self.expire, self.max_age_days)
    }
}

fn policy_for(expire: bool, days: u32) -> CachePolicy {
    if expire {
        CachePolicy::days(days)
    } else {
        CachePolicy::never_expire()
    }
}

/// Network acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub direct: bool,
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
    pub archive_endpoint: String,
    pub user_agent: String,
    /// Whether downloaded bytes expire at all.
    pub cache_expire: bool,
    pub cache_max_age_days: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            direct: false,
            retries: 3,
            retry_delay_secs: 5,
            timeout_secs: 30,
            archive_endpoint: crate::fetch::archive::DEFAULT_ENDPOINT.to_string(),
            user_agent: concat!("playbill/", env!("CARGO_PKG_VERSION")).to_string(),
            cache_expire: false,
            cache_max_age_days: 30,
        }
    }
}

impl FetchConfig {
    pub fn settings(&self) -> FetchSettings {
        FetchSettings {
            direct: self.direct,
            retries: self.retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_policy(&self) -> CachePolicy {
        policy_for(self.cache_expire, self.cache_max_age_days)
    }
}

/// Thumbnail frame, encoding and trimming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Lossy encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    pub trim_tolerance: u8,
    pub fit_to_frame: bool,
    /// Output format, as a file extension.
    pub format: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_width: 500,
            max_height: 400,
            quality: 90,
            trim_tolerance: crate::imaging::DEFAULT_TRIM_TOLERANCE,
            fit_to_frame: true,
            format: "jpg".to_string(),
        }
    }
}

impl ImagesConfig {
    pub fn frame(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    pub fn trim_params(&self) -> TrimParams {
        TrimParams {
            tolerance: self.trim_tolerance,
            frame: self.fit_to_frame.then(|| self.frame()),
        }
    }
}

/// Text recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrConfig {
    pub enabled: bool,
    pub program: String,
    /// Tesseract language code.
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "tesseract".to_string(),
            language: "spa".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"playbill=debug"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PlaybillConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PlaybillConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PlaybillConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<PlaybillConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Playbill Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Root directory of every cached artifact (pages, API listings, downloads).
cache_root = ".playbill-cache"

# ---------------------------------------------------------------------------
# Structured cache staleness
# ---------------------------------------------------------------------------
[cache]
# Artifacts older than this many days are recomputed.
max_age_days = 1
# Set to false to keep artifacts forever (existence alone governs reuse).
expire = true

# ---------------------------------------------------------------------------
# Network acquisition
# ---------------------------------------------------------------------------
[fetch]
# Fetch origins directly instead of going through the web archive.
# Overridden by the PLAYBILL_DIRECT_FETCH environment variable.
direct = false
# Extra archive lookup rounds after the first, before the origin is tried.
retries = 3
# Fixed delay between rounds, in seconds.
retry_delay_secs = 5
# Per-request timeout, in seconds.
timeout_secs = 30
archive_endpoint = "https://archive.org/wayback/available"
user_agent = "playbill/0.4.0"
# Downloaded bytes never expire unless this is true.
cache_expire = false
cache_max_age_days = 30

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
# Thumbnail frame. Images are scaled down to fit, never up.
max_width = 500
max_height = 400
# Lossy encoding quality (1 = worst, 100 = best).
quality = 90
# Per-channel difference from the frame color still treated as frame.
trim_tolerance = 25
# Grow trimmed content back toward the frame's aspect ratio.
fit_to_frame = true
# Output format: jpg, png, webp or avif.
format = "jpg"

# ---------------------------------------------------------------------------
# Text recognition
# ---------------------------------------------------------------------------
[ocr]
enabled = false
program = "tesseract"
language = "spa"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directive. PLAYBILL_LOG takes precedence.
level = "info"
"##
}
