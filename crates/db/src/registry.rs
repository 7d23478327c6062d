//! Collection URI registry
//!
//! The blob store is immutable, so every collection mutation produces a new
//! URI and the old one goes stale. The registry is the authoritative map
//! from collection name to current URI, persisted through a small side
//! channel (`POST /api/grove/uri`). `UriRegistry` keeps a process-local
//! mirror of that map so reads don't round-trip on every resolve.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DbError;

/// Shared HTTP client instance (reused across all registry requests)
static HTTP_CLIENT: OnceCell<Arc<Client>> = OnceCell::new();

fn shared_http_client(timeout_secs: u64) -> Result<Arc<Client>, DbError> {
    HTTP_CLIENT
        .get_or_try_init(|| {
            Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .map(Arc::new)
                .map_err(|e| DbError::Registry(format!("failed to create HTTP client: {}", e)))
        })
        .map(|client| client.clone())
}

/// Configuration for the HTTP registry backend.
///
/// The base URL can be overridden via `REGISTRY_API_URL`.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub http_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("REGISTRY_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            http_timeout_secs: 10,
        }
    }
}

impl RegistryConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Persistence backend for the name-to-URI map
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Fetch the full current mapping
    async fn fetch_all(&self) -> Result<HashMap<String, String>, DbError>;

    /// Persist one entry
    async fn put(&self, key: &str, uri: &str) -> Result<(), DbError>;
}

/// Registry backend talking to the URI persistence side channel
pub struct HttpRegistry {
    base_url: String,
    client: Arc<Client>,
}

impl HttpRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, DbError> {
        let client = shared_http_client(config.http_timeout_secs)?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/grove/uri", self.base_url)
    }
}

#[async_trait]
impl RegistryBackend for HttpRegistry {
    async fn fetch_all(&self) -> Result<HashMap<String, String>, DbError> {
        let response = self
            .client
            .get(self.endpoint())
            .send()
            .await
            .map_err(|e| DbError::Registry(format!("failed to fetch registry: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DbError::Registry(format!(
                "registry fetch returned status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DbError::Registry(format!("invalid registry response: {}", e)))
    }

    async fn put(&self, key: &str, uri: &str) -> Result<(), DbError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&serde_json::json!({ "key": key, "uri": uri }))
            .send()
            .await
            .map_err(|e| DbError::Registry(format!("failed to persist registry entry: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DbError::Registry(format!(
                "registry update returned status {}",
                status
            )));
        }
        Ok(())
    }
}

/// In-memory registry backend for tests and local development.
///
/// Counts persistence calls and can be told to reject writes, so tests can
/// pin the no-op and orphaned-blob behaviors.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: Mutex<HashMap<String, String>>,
    puts: AtomicU64,
    fail_puts: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, uri: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), uri.to_string());
        }
    }

    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }
}

#[async_trait]
impl RegistryBackend for MemoryRegistry {
    async fn fetch_all(&self) -> Result<HashMap<String, String>, DbError> {
        Ok(self
            .entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    async fn put(&self, key: &str, uri: &str) -> Result<(), DbError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(DbError::Registry("registry write rejected".to_string()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DbError::Registry("registry lock poisoned".to_string()))?;
        entries.insert(key.to_string(), uri.to_string());
        Ok(())
    }
}

/// The authoritative pointer map, consulted before every collection read.
pub struct UriRegistry {
    backend: Arc<dyn RegistryBackend>,
    mirror: RwLock<HashMap<String, String>>,
}

impl UriRegistry {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            mirror: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the current URI for a collection name.
    ///
    /// A mirror hit answers locally; otherwise the full map is refreshed
    /// from the backend. `Ok(None)` means the collection has never been
    /// written.
    pub async fn resolve(&self, name: &str) -> Result<Option<String>, DbError> {
        if let Ok(mirror) = self.mirror.read() {
            if let Some(uri) = mirror.get(name) {
                return Ok(Some(uri.clone()));
            }
        }

        let latest = self.backend.fetch_all().await?;
        let resolved = latest.get(name).cloned();
        if let Ok(mut mirror) = self.mirror.write() {
            *mirror = latest;
        }
        Ok(resolved)
    }

    /// Point `name` at `new_uri`, persisting through the backend.
    ///
    /// No-ops (and reports success) when the registry already points there.
    /// On persistence failure the error is logged and `false` returned; the
    /// already-uploaded blob is left orphaned and readers keep resolving
    /// the previous URI. No rollback, no retry.
    pub async fn update(&self, name: &str, new_uri: &str) -> bool {
        match self.resolve(name).await {
            Ok(Some(current)) if current == new_uri => {
                debug!("Registry already points {} at {}", name, new_uri);
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Could not read current registry entry for {}: {}", name, e);
            }
        }

        match self.backend.put(name, new_uri).await {
            Ok(()) => {
                if let Ok(mut mirror) = self.mirror.write() {
                    mirror.insert(name.to_string(), new_uri.to_string());
                }
                debug!("Registry updated: {} -> {}", name, new_uri);
                true
            }
            Err(e) => {
                warn!(
                    "Failed to persist registry entry {} -> {}: {}",
                    name, new_uri, e
                );
                false
            }
        }
    }

    /// Every URI the mirror currently knows, for the defensive cache sweep
    pub fn known_uris(&self) -> Vec<String> {
        self.mirror
            .read()
            .map(|mirror| mirror.values().cloned().collect())
            .unwrap_or_default()
    }
}
