use std::time::Duration;

use thiserror::Error;
use tokio::io;

/// Failures of a single transport-level operation.
///
/// Every variant is terminal for one iteration only: the caller
/// counts it and moves on.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("transport setup failed: {0}")]
    TransportSetup(String),

    #[error("failed to connect to proxy {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("request failed: {0}")]
    Request(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ProxyError::TransportSetup(err.to_string())
        } else {
            ProxyError::Request(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
