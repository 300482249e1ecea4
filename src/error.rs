use thiserror::Error;

use crate::proxies::common::ProxyError;
use crate::validation::ValidationError;

/// Run-level errors.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Malformed proxy string, unsupported protocol or bad settings.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no enabled proxies to benchmark")]
    NoProxies,

    /// A phase could not complete for every proxy.
    #[error("{phase} phase failed: {reason}")]
    Phase { phase: &'static str, reason: String },

    #[error(transparent)]
    Transport(#[from] ProxyError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
