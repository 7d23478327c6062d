pub mod cache;
pub mod error;
pub mod grove;
pub mod memory;

pub use cache::{Clock, DEFAULT_TTL, FetchCache, ManualClock, SystemClock};
pub use error::StorageError;
pub use grove::{AccessControl, GroveClient, GroveConfig, UploadReceipt};
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

/// Backend trait for immutable JSON blob storage.
///
/// Every upload yields a fresh URI (the store is content-addressed); there
/// is no mutation in place. Implemented by `GroveClient` for the remote
/// service and `MemoryStore` for tests and local development.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a document as a new blob, scoped by the writer's ACL
    async fn upload_json(
        &self,
        document: &Value,
        acl: &AccessControl,
    ) -> Result<UploadReceipt, StorageError>;

    /// Fetch and parse the blob at `uri`
    async fn fetch_json(&self, uri: &str) -> Result<Value, StorageError>;

    /// Backend name for logging
    fn store_name(&self) -> &'static str {
        "unknown"
    }
}
