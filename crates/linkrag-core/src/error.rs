//! Error types for the payload codec.
//!
//! Retrieval has no error type: empty or irrelevant queries degrade to an
//! empty result set. Only decoding and encoding a payload can fail.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Errors raised while normalizing, encoding or decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The input does not have the shape of a payload.
    #[error("invalid payload: {0}")]
    Validation(String),

    /// The `v` field names a version this build cannot read.
    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(String),

    /// Compression produced nothing.
    #[error("failed to encode payload: {0}")]
    Encoding(String),

    /// The token did not decompress, or did not hold JSON.
    #[error("failed to decode payload: {0}")]
    Decoding(String),
}
