//! Error types for the blob storage layer

use thiserror::Error;

/// Errors raised by blob storage clients.
///
/// Fetch and upload failures carry the URI (or attempt count) so callers
/// can tell which blob was unavailable. A fetch failure means the data is
/// temporarily unavailable; it must never be treated as an empty document.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid storage URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("failed to fetch {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    #[error("upload failed after {attempts} attempts: {reason}")]
    Upload { attempts: u32, reason: String },

    #[error("malformed storage response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}
