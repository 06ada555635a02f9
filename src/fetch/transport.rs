//! Byte transport abstraction.
//!
//! The fetcher only needs "GET this URL, give me the body". Keeping that
//! behind a trait lets the retry and fallback logic run against a recording
//! fake in tests, the same way image operations run against a mock backend.

use super::FetchError;
use std::time::Duration;

pub trait Transport: Send + Sync {
    /// Fetch the body of `url`. Non-success HTTP statuses are errors.
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| map_http_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(|e| map_http_error(url, e))?;
        Ok(body.to_vec())
    }
}

fn map_http_error(url: &str, error: reqwest::Error) -> FetchError {
    if let Some(status) = error.status() {
        return FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        };
    }
    let reason = if error.is_timeout() {
        format!("timed out: {error}")
    } else if error.is_connect() {
        format!("connection error: {error}")
    } else {
        error.to_string()
    };
    FetchError::Network {
        url: url.to_string(),
        reason,
    }
}
