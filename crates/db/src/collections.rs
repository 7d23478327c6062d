//! Collection read-modify-write store
//!
//! A collection lives as one JSON document `{ "<name>": [row, ...] }` at
//! the URI the registry currently points at. Reads resolve the pointer,
//! fetch through the TTL cache, and unwrap the array. Mutations load the
//! current array, apply a closure, re-upload the whole document as a new
//! blob, and repoint the registry.
//!
//! Concurrent mutations are NOT serialized: two writers that load the same
//! base array upload divergent documents and the last registry write wins,
//! silently discarding the other writer's change. The content-addressed
//! backend could support a compare-and-swap on the pointer, but that is
//! deliberately not used here.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use storage::{AccessControl, BlobStore, FetchCache};
use tracing::{debug, warn};

use crate::error::DbError;
use crate::model::CollectionKind;
use crate::registry::UriRegistry;

pub struct CollectionStore {
    store: Arc<dyn BlobStore>,
    cache: Arc<FetchCache>,
    registry: Arc<UriRegistry>,
}

impl CollectionStore {
    pub fn new(
        store: Arc<dyn BlobStore>,
        cache: Arc<FetchCache>,
        registry: Arc<UriRegistry>,
    ) -> Self {
        Self {
            store,
            cache,
            registry,
        }
    }

    pub fn registry(&self) -> &UriRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Load the current rows of a collection.
    ///
    /// A collection with no registered URI has never been written and reads
    /// as empty. A document without the expected wrapper array is logged
    /// and also reads as empty — the store enforces no schema, and
    /// availability wins over strictness here. A fetch failure, by
    /// contrast, is an error: it must not be mistaken for an empty
    /// collection.
    pub async fn load(&self, kind: CollectionKind) -> Result<Vec<Value>, DbError> {
        let Some(uri) = self.registry.resolve(kind.key()).await? else {
            debug!("Collection {} has no registered URI yet", kind);
            return Ok(Vec::new());
        };
        self.load_at(kind, &uri).await
    }

    /// Load the rows of a collection, deserializing each element.
    ///
    /// Rows that fail to deserialize are skipped with a warning rather than
    /// failing the whole read.
    pub async fn load_as<T: DeserializeOwned>(
        &self,
        kind: CollectionKind,
    ) -> Result<Vec<T>, DbError> {
        let rows = self.load(kind).await?;
        let mut typed = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value(row) {
                Ok(value) => typed.push(value),
                Err(e) => warn!("Skipping malformed {} row: {}", kind, e),
            }
        }
        Ok(typed)
    }

    /// Apply a mutation to a collection and persist the result.
    ///
    /// Loads the current array, applies `f`, uploads the mutated document
    /// as a new blob scoped to the writer's ACL, and repoints the registry.
    /// On a successful repoint the stale URI is dropped from the cache and
    /// a sweep invalidates every registry-known URI. If the registry update
    /// fails the uploaded blob is orphaned — readers keep the pre-mutation
    /// state — and the new URI is still returned.
    pub async fn mutate<F>(
        &self,
        kind: CollectionKind,
        writer: &AccessControl,
        f: F,
    ) -> Result<String, DbError>
    where
        F: FnOnce(Vec<Value>) -> Vec<Value>,
    {
        let previous_uri = self.registry.resolve(kind.key()).await?;
        let rows = match &previous_uri {
            Some(uri) => self.load_at(kind, uri).await?,
            None => Vec::new(),
        };

        let mutated = f(rows);
        let row_count = mutated.len();
        let mut wrapper = serde_json::Map::new();
        wrapper.insert(kind.key().to_string(), Value::Array(mutated));
        let document = Value::Object(wrapper);

        let receipt = self.store.upload_json(&document, writer).await?;
        debug!(
            "Uploaded {} rows for {} to {}",
            row_count, kind, receipt.uri
        );

        if self.registry.update(kind.key(), &receipt.uri).await {
            if let Some(old) = &previous_uri {
                self.cache.remove(old);
            }
            self.cache.invalidate_many(&self.registry.known_uris());
        } else {
            warn!(
                "Registry update for {} failed; blob {} is unreachable and readers keep the previous state",
                kind, receipt.uri
            );
        }

        Ok(receipt.uri)
    }

    /// Append one serialized row to a collection
    pub async fn append<T: Serialize>(
        &self,
        kind: CollectionKind,
        writer: &AccessControl,
        row: &T,
    ) -> Result<String, DbError> {
        let row = serde_json::to_value(row)?;
        self.mutate(kind, writer, move |mut rows| {
            rows.push(row);
            rows
        })
        .await
    }

    async fn load_at(&self, kind: CollectionKind, uri: &str) -> Result<Vec<Value>, DbError> {
        let document = match self.cache.get(uri) {
            Some(document) => document,
            None => {
                let document = self.store.fetch_json(uri).await?;
                self.cache.insert(uri, document.clone());
                document
            }
        };
        Ok(unwrap_rows(kind, uri, &document))
    }
}

fn unwrap_rows(kind: CollectionKind, uri: &str, document: &Value) -> Vec<Value> {
    match document.get(kind.key()).and_then(Value::as_array) {
        Some(rows) => rows.clone(),
        None => {
            warn!(
                "Document at {} is missing the '{}' array, treating collection as empty",
                uri, kind
            );
            Vec::new()
        }
    }
}

/// Next auto-assigned id for a collection: one past the current maximum
pub(crate) fn next_id(rows: &[Value]) -> u64 {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(Value::as_u64))
        .max()
        .unwrap_or(0)
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_id(&[]), 1);
    }

    #[test]
    fn next_id_is_one_past_the_maximum() {
        let rows = vec![json!({"id": 3}), json!({"id": 7}), json!({"id": 2})];
        assert_eq!(next_id(&rows), 8);
    }

    #[test]
    fn next_id_ignores_rows_without_numeric_ids() {
        let rows = vec![json!({"id": "x"}), json!({}), json!({"id": 4})];
        assert_eq!(next_id(&rows), 5);
    }

    #[test]
    fn unwrap_rows_defaults_malformed_documents_to_empty() {
        let document = json!({"wrong_key": [1, 2, 3]});
        assert!(unwrap_rows(CollectionKind::Users, "lens://x", &document).is_empty());

        let document = json!({"users": "not-an-array"});
        assert!(unwrap_rows(CollectionKind::Users, "lens://x", &document).is_empty());
    }
}
