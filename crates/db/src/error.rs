//! Error types for the collection database layer

use storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the collection store and typed accessors.
///
/// Accessors distinguish "no data" from "the fetch failed": absence is
/// `Ok(None)` / `Ok(false)` / an empty vec, while storage and registry
/// faults propagate as `Err` so callers can pick their own fallback policy.
#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("registry backend error: {0}")]
    Registry(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
