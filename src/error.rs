//! Error types for the exporter
//!
//! Only [`ConfigError`] is fatal. Everything else is handled inside a single poll
//! cycle and ends up as a log line.

use thiserror::Error;

/// Missing or unusable required configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset
    #[error("environment variable {0} is not set, you should define it")]
    Missing(&'static str),

    /// A required environment variable is set but cannot be a URL
    #[error("environment variable {name} is too short to be a URL: {value:?}")]
    InvalidUrl { name: &'static str, value: String },
}

/// The upstream status endpoint could not be read
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS, timeout or body read failure
    #[error("can't connect to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
}

/// The status payload is not valid JSON for the expected shape
#[derive(Debug, Error)]
#[error("can't parse status payload: {0}")]
pub struct ParseError(#[from] serde_json::Error);

/// An alert could not be delivered to the receiver
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("can't encode alert: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("can't reach alert receiver at {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("alert receiver at {url} rejected the alert with HTTP {status}")]
    Rejected { url: String, status: u16 },
}
