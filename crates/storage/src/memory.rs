//! In-memory blob store
//!
//! Content-addressed `BlobStore` backend for tests and local development.
//! Mimics the one guarantee the remote store gives us: uploading the same
//! bytes yields the same `mem://` URI, and blobs are never mutated in place.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::StorageError;
use crate::grove::{AccessControl, UploadReceipt};
use crate::BlobStore;

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Value>>,
    uploads: AtomicU64,
    fetches: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of uploads served, for asserting on write traffic in tests
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Number of fetches served, for asserting on cache behavior in tests
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn upload_json(
        &self,
        document: &Value,
        acl: &AccessControl,
    ) -> Result<UploadReceipt, StorageError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        let body = document.to_string();
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        let key = general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());
        let uri = format!("mem://{}", key);

        let mut blobs = self.blobs.lock().map_err(|_| StorageError::Upload {
            attempts: 1,
            reason: "memory store lock poisoned".to_string(),
        })?;
        blobs.insert(uri.clone(), document.clone());
        debug!("Stored blob {} for {:?}", uri, acl);

        Ok(UploadReceipt {
            uri,
            gateway_url: None,
            storage_key: Some(key),
        })
    }

    async fn fetch_json(&self, uri: &str) -> Result<Value, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let blobs = self.blobs.lock().map_err(|_| StorageError::Fetch {
            uri: uri.to_string(),
            reason: "memory store lock poisoned".to_string(),
        })?;
        blobs.get(uri).cloned().ok_or_else(|| StorageError::Fetch {
            uri: uri.to_string(),
            reason: "unknown blob".to_string(),
        })
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
