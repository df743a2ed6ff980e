//! Error types for job persistence and push-message decoding.
//!
//! Library crates use `thiserror` for explicit error enums.

use thiserror::Error;

/// Failures of the job storage slot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialized mapping does not fit in the slot.
    #[error("storage quota exceeded: {needed} bytes (limit: {limit})")]
    QuotaExceeded {
        /// Bytes the write needed.
        needed: usize,
        /// Slot capacity.
        limit: usize,
    },

    /// Filesystem failure.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Mapping could not be encoded.
    #[error("storage encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Push message that cannot be interpreted at all.
#[derive(Debug, Error)]
pub enum MessageError {
    /// Payload is not a JSON object.
    #[error("malformed push message: {0}")]
    Malformed(String),

    /// JSON object without a `tipo` tag.
    #[error("push message has no `tipo` tag")]
    MissingTag,
}
