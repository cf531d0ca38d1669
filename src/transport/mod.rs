//! Fetch seam between the refresh controller and the network
//!
//! The controller only sees [`Transport`]: one blocking call that turns a
//! [`RequestSpec`] into a JSON payload or a [`FetchError`]. Timeouts are
//! reported as their own variant so the retry policy can tell them apart
//! from failures that must not be retried.

use crate::pagination::PaginationState;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

/// Everything needed to issue one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub url: String,
    /// Form-encoded pagination state; empty for selects
    pub query: String,
    /// Placed between `url` and `query`
    pub delimiter: String,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

impl RequestSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: String::new(),
            delimiter: "&".to_string(),
            timeout: Duration::from_secs(30),
            headers: BTreeMap::new(),
        }
    }

    /// Append the pagination state as the query
    pub fn with_state(mut self, state: &PaginationState) -> Self {
        self.query = state.to_query();
        self
    }

    /// Full request URL
    pub fn build_url(&self) -> String {
        if self.query.is_empty() {
            self.url.clone()
        } else {
            format!("{}{}{}", self.url, self.delimiter, self.query)
        }
    }
}

/// Why a fetch produced no payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Request did not complete within its timeout (retried)
    Timeout,
    /// Server answered with a non-success status
    Http { status: u16 },
    /// Connection-level failure
    Network(String),
    /// Body was not valid JSON
    Decode(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Request timed out"),
            Self::Http { status } => write!(f, "HTTP error ({})", status),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Decode(msg) => write!(f, "Invalid JSON response: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of table payloads
///
/// Calls block the current thread; the refresh worker owns its own thread
/// for exactly this reason.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: &RequestSpec) -> Result<serde_json::Value, FetchError>;
}

/// `reqwest` transport issuing plain GET requests
///
/// The client is built on first use, so constructing the transport is free
/// even where it never fetches.
#[derive(Default)]
pub struct HttpTransport {
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, FetchError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let client = reqwest::blocking::Client::builder()
            .gzip(true)
            .user_agent(concat!("jsontable/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(self.client.get_or_init(|| client))
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, request: &RequestSpec) -> Result<serde_json::Value, FetchError> {
        let url = request.build_url();
        tracing::debug!("GET {}", url);

        let mut req = self
            .client()?
            .get(&url)
            .timeout(request.timeout)
            .header("Accept", "application/json");
        for (name, value) in &request.headers {
            req = req.header(name, value);
        }

        let response = req.send().map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        response.json().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Decode(e.to_string())
            }
        })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = e.status() {
        FetchError::Http {
            status: status.as_u16(),
        }
    } else {
        FetchError::Network(e.to_string())
    }
}
