//! Error types for wire-record decoding in ecomind-types.

use thiserror::Error;

/// Errors that can occur when decoding a wire record.
///
/// This error type is transport-agnostic and does not include
/// socket errors (those belong in ecomind-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The datagram body is not valid UTF-8.
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The body is not a JSON document of the expected shape.
    #[error("Invalid record: {0}")]
    Json(#[from] serde_json::Error),

    /// The body decoded but a field value is unusable.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using ecomind-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
