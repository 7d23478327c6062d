//! Time-boxed fetch cache
//!
//! Caches fetched blob documents by URI so repeated reads of the same
//! collection within the TTL window skip the network. The cache is an
//! explicit object with an injected clock: construct one `FetchCache` at
//! process start, share it via `Arc`, and pass a `ManualClock` in tests to
//! make expiry deterministic.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default time-to-live for cached documents
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Clock abstraction so cache expiry can be tested without sleeping
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Advanceable clock for deterministic tests
pub struct ManualClock {
    base: Instant,
    offset_millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

struct CacheEntry {
    value: Value,
    fetched_at: Instant,
}

pub struct FetchCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FetchCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached document for `uri` if it is still fresh.
    ///
    /// An entry is fresh while its age is strictly less than the TTL; an
    /// entry exactly at the TTL is stale. Expired entries are dropped on
    /// observation.
    pub fn get(&self, uri: &str) -> Option<Value> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        let now = self.clock.now();
        match entries.get(uri) {
            Some(entry) if now.duration_since(entry.fetched_at) < self.ttl => {
                debug!("Cache hit for {}", uri);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry for {} expired", uri);
                entries.remove(uri);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, uri: &str, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                uri.to_string(),
                CacheEntry {
                    value,
                    fetched_at: self.clock.now(),
                },
            );
        }
    }

    /// Drop a single entry, used after a mutation made its URI stale
    pub fn remove(&self, uri: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.remove(uri).is_some() {
                debug!("Invalidated cache entry for {}", uri);
            }
        }
    }

    /// Drop every entry whose URI appears in `uris`.
    ///
    /// Used as the sweep over all registry-known URIs after a
    /// collection-wide mutation, in case the registry moved underneath us.
    pub fn invalidate_many(&self, uris: &[String]) {
        if let Ok(mut entries) = self.entries.lock() {
            let mut dropped = 0;
            for uri in uris {
                if entries.remove(uri).is_some() {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                debug!("Invalidated {} cache entries", dropped);
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
