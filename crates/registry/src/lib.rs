//! Collection URI registry service
//!
//! The blob store is immutable, so every collection mutation produces a
//! new URI; this service holds the authoritative map from collection name
//! to its current URI. Clients read the full map and POST updated entries
//! after each re-upload. The map is persisted to a JSON config file with
//! an atomic write-then-rename.

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Collection names the registry accepts; anything else is a bad request
pub const KNOWN_COLLECTIONS: [&str; 4] = ["users", "repositories", "nfts", "activities"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UriUpdate {
    pub key: String,
    pub uri: String,
}

pub struct AppState {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl AppState {
    /// Load the registry from its config file; a missing file is an empty
    /// registry.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("invalid registry config at {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No registry config at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Write the full map to disk, atomically via a temp file and rename
    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/grove/uri", get(get_uris).post(put_uri))
        .route("/api/grove/uri/{key}", get(get_uri))
        .with_state(state)
}

async fn get_uris(State(state): State<Arc<AppState>>) -> Json<HashMap<String, String>> {
    let entries = state.entries.read().await;
    Json(entries.clone())
}

async fn get_uri(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let entries = state.entries.read().await;
    match entries.get(&key) {
        Some(uri) => Ok(Json(serde_json::json!({ "key": key, "uri": uri }))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn put_uri(
    State(state): State<Arc<AppState>>,
    Json(update): Json<UriUpdate>,
) -> Result<Json<HashMap<String, String>>, (StatusCode, String)> {
    if !KNOWN_COLLECTIONS.contains(&update.key.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("unknown collection '{}'", update.key),
        ));
    }

    let mut entries = state.entries.write().await;
    if entries.get(&update.key) == Some(&update.uri) {
        debug!("Registry already points {} at {}", update.key, update.uri);
        return Ok(Json(entries.clone()));
    }

    // Persist before committing so a failed write leaves readers on the
    // previous mapping
    let mut next = entries.clone();
    next.insert(update.key.clone(), update.uri.clone());
    if let Err(e) = state.persist(&next).await {
        warn!("Failed to persist registry config: {}", e);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to persist registry".to_string(),
        ));
    }

    *entries = next;
    info!("Registry updated: {} -> {}", update.key, update.uri);
    Ok(Json(entries.clone()))
}
