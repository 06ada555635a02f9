//! Web-archive snapshot lookup.
//!
//! Queries the Wayback Machine availability API:
//!
//! ```text
//! GET {endpoint}?url=<original url>
//! {"archived_snapshots": {"closest": {"available": true, "url": "...", "timestamp": "20240101000000", "status": "200"}}}
//! ```
//!
//! An empty `archived_snapshots` object means nothing is archived.

use super::{FetchError, Transport};
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://archive.org/wayback/available";

/// The archived copy closest in time to the lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub original: String,
    pub timestamp: String,
    pub url: String,
}

impl Snapshot {
    /// URL serving the archived bytes verbatim, without the archive's
    /// replay toolbar or link rewriting.
    pub fn raw_url(&self) -> String {
        format!(
            "https://web.archive.org/web/{}id_/{}",
            self.timestamp, self.original
        )
    }
}

#[derive(Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Deserialize, Default)]
struct ArchivedSnapshots {
    closest: Option<Closest>,
}

#[derive(Deserialize)]
struct Closest {
    #[serde(default)]
    available: bool,
    url: String,
    timestamp: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WaybackArchive {
    endpoint: String,
}

impl Default for WaybackArchive {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl WaybackArchive {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn lookup_url(&self, url: &str) -> Result<String, FetchError> {
        reqwest::Url::parse_with_params(&self.endpoint, &[("url", url)])
            .map(String::from)
            .map_err(|e| FetchError::Archive {
                url: url.to_string(),
                reason: format!("bad archive endpoint {:?}: {e}", self.endpoint),
            })
    }

    /// Nearest usable snapshot of `url`, or `None` if nothing is archived.
    pub fn closest(
        &self,
        transport: &dyn Transport,
        url: &str,
    ) -> Result<Option<Snapshot>, FetchError> {
        let body = transport.get(&self.lookup_url(url)?)?;
        parse_availability(url, &body)
    }
}

pub(crate) fn parse_availability(url: &str, body: &[u8]) -> Result<Option<Snapshot>, FetchError> {
    let availability: Availability =
        serde_json::from_slice(body).map_err(|e| FetchError::Archive {
            url: url.to_string(),
            reason: format!("unexpected availability response: {e}"),
        })?;
    let Some(closest) = availability.archived_snapshots.closest else {
        return Ok(None);
    };
    // Archived redirects and error pages are not the resource itself.
    let archived_ok = closest.status.as_deref().is_none_or(|s| s.starts_with('2'));
    if !closest.available || !archived_ok {
        return Ok(None);
    }
    Ok(Some(Snapshot {
        original: url.to_string(),
        timestamp: closest.timestamp,
        url: closest.url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSTER: &str = "https://cdn.example.com/media/poster.jpg";

    #[test]
    fn lookup_url_encodes_target() {
        let archive = WaybackArchive::default();
        assert_eq!(
            archive.lookup_url("https://a.example/x?y=1").unwrap(),
            "https://archive.org/wayback/available?url=https%3A%2F%2Fa.example%2Fx%3Fy%3D1"
        );
    }

    #[test]
    fn lookup_url_rejects_bad_endpoint() {
        let archive = WaybackArchive::new("not a url");
        assert!(matches!(
            archive.lookup_url(POSTER),
            Err(FetchError::Archive { .. })
        ));
    }

    #[test]
    fn parses_available_snapshot() {
        let body = br#"{"url": "x", "archived_snapshots": {"closest": {
            "available": true,
            "url": "http://web.archive.org/web/20240102030405/https://cdn.example.com/media/poster.jpg",
            "timestamp": "20240102030405",
            "status": "200"}}}"#;
        let snap = parse_availability(POSTER, body).unwrap().unwrap();
        assert_eq!(snap.timestamp, "20240102030405");
        assert_eq!(
            snap.raw_url(),
            "https://web.archive.org/web/20240102030405id_/https://cdn.example.com/media/poster.jpg"
        );
    }

    #[test]
    fn empty_snapshots_mean_not_archived() {
        let body = br#"{"url": "x", "archived_snapshots": {}}"#;
        assert_eq!(parse_availability(POSTER, body).unwrap(), None);
    }

    #[test]
    fn archived_error_page_is_not_a_snapshot() {
        let body = br#"{"archived_snapshots": {"closest": {
            "available": true, "url": "u", "timestamp": "1", "status": "404"}}}"#;
        assert_eq!(parse_availability(POSTER, body).unwrap(), None);
    }

    #[test]
    fn garbage_response_is_archive_error() {
        assert!(matches!(
            parse_availability(POSTER, b"<html>rate limited</html>"),
            Err(FetchError::Archive { .. })
        ));
    }
}
