//! Error types for the collector.

use thiserror::Error;

/// Errors raised while receiving or rendering datagrams.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Receive failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A receive time could not be formatted.
    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),

    /// A line could not be encoded.
    #[error("JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias using [`CollectorError`].
pub type Result<T> = std::result::Result<T, CollectorError>;
