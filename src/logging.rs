//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. Filter precedence, highest first:
//!
//! 1. `PLAYBILL_LOG` environment variable
//! 2. `[logging] level` from `config.toml`
//! 3. `info`

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "PLAYBILL_LOG";

const FALLBACK_LEVEL: &str = "info";

/// Pick the filter directive from the environment value and the configured level.
///
/// Blank values are ignored; a directive that does not parse falls through
/// to the next source.
pub fn resolve_filter(env_value: Option<&str>, configured: &str) -> EnvFilter {
    [env_value, Some(configured)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
}

/// Install the global subscriber, writing human-readable lines to stderr.
///
/// Calling it twice is harmless: the second installation is ignored.
pub fn init_logging(configured: &str) {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = resolve_filter(env_value.as_deref(), configured);
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
    if let Err(e) = result {
        tracing::debug!(error = %e, "logging already initialized");
    }
}
