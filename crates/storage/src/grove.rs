//! Grove blob storage client
//!
//! Grove is an immutable, content-addressed JSON blob store: every upload
//! produces a new `lens://` URI, and there is no mutation in place. Uploads
//! carry an access-control rule tying write ownership to a wallet address.
//! Reads resolve the `lens://` URI to a gateway URL and GET it.

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;
use std::env;
use std::time::Instant;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, warn};

use crate::BlobStore;
use crate::error::StorageError;

const BASE_RETRY_DELAY_SECS: u64 = 2;

/// Configuration for the Grove client
///
/// Defaults target the public Grove API on the Lens testnet chain and can be
/// overridden via `GROVE_API_URL`, `GROVE_GATEWAY_URL`, `GROVE_CHAIN_ID` and
/// `GROVE_MAX_RETRIES`.
#[derive(Debug, Clone)]
pub struct GroveConfig {
    pub api_url: String,
    pub gateway_url: String,
    pub chain_id: u64,
    pub max_retries: u32,
    pub http_timeout_secs: u64,
}

impl Default for GroveConfig {
    fn default() -> Self {
        Self {
            api_url: env::var("GROVE_API_URL")
                .unwrap_or_else(|_| "https://api.grove.storage".to_string()),
            gateway_url: env::var("GROVE_GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.grove.storage".to_string()),
            chain_id: env::var("GROVE_CHAIN_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(37111),
            max_retries: env::var("GROVE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            http_timeout_secs: 30,
        }
    }
}

impl GroveConfig {
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: impl Into<String>) -> Self {
        self.gateway_url = gateway_url.into();
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if self.api_url.is_empty() {
            return Err(StorageError::Config("api_url is empty".to_string()));
        }
        if self.gateway_url.is_empty() {
            return Err(StorageError::Config("gateway_url is empty".to_string()));
        }
        if self.max_retries == 0 {
            return Err(StorageError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Access-control rule attached to an upload.
///
/// The backend scopes write ownership of the blob to this identity; it still
/// returns a fresh URI on every upload regardless of the rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessControl {
    WalletAddress { address: String, chain_id: u64 },
}

impl AccessControl {
    pub fn wallet(address: impl Into<String>, chain_id: u64) -> Self {
        Self::WalletAddress {
            address: address.into(),
            chain_id,
        }
    }

    /// ACL document in the wire format the Grove API expects
    pub fn to_json(&self) -> Value {
        match self {
            Self::WalletAddress { address, chain_id } => serde_json::json!({
                "template": "wallet_address",
                "wallet_address": address,
                "chain_id": chain_id,
            }),
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub uri: String,
    pub gateway_url: Option<String>,
    pub storage_key: Option<String>,
}

pub struct GroveClient {
    config: GroveConfig,
    client: reqwest::Client,
}

impl GroveClient {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(GroveConfig::default())
    }

    pub fn with_config(config: GroveConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| StorageError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GroveConfig {
        &self.config
    }

    /// Upload a JSON document as a new blob, scoped to the writer's ACL.
    ///
    /// Server errors (5xx) and transport errors are retried with exponential
    /// backoff up to the configured number of attempts. Client errors (4xx)
    /// are not retried.
    pub async fn upload_json(
        &self,
        document: &Value,
        acl: &AccessControl,
    ) -> Result<UploadReceipt, StorageError> {
        let url = format!(
            "{}/?chain_id={}",
            self.config.api_url.trim_end_matches('/'),
            self.config.chain_id
        );
        let acl_part = acl.to_json().to_string();
        let body = document.to_string();

        let max_retries = self.config.max_retries;
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            debug!("Uploading document to Grove (attempt {}/{})", attempt, max_retries);
            let start = Instant::now();

            // multipart is rebuilt per attempt since send() consumes the form
            let form = multipart::Form::new()
                .text("lens-acl.json", acl_part.clone())
                .text("document.json", body.clone());

            let response = match self.client.post(&url).multipart(form).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = format!("request failed: {}", e);
                    if attempt < max_retries {
                        let retry_delay = BASE_RETRY_DELAY_SECS * 2_u64.pow(attempt - 1);
                        warn!(
                            "Failed to send upload to Grove (attempt {}/{}): {}. Retrying in {} seconds...",
                            attempt, max_retries, e, retry_delay
                        );
                        sleep(Duration::from_secs(retry_delay)).await;
                        continue;
                    }
                    break;
                }
            };

            debug!("Upload request completed in {:?}", start.elapsed());

            let status = response.status();
            if status.is_success() {
                let info: Value = match response.json().await {
                    Ok(json) => json,
                    Err(e) => {
                        last_error = format!("failed to parse upload response: {}", e);
                        if attempt < max_retries {
                            let retry_delay = BASE_RETRY_DELAY_SECS * 2_u64.pow(attempt - 1);
                            warn!(
                                "Failed to parse Grove response (attempt {}/{}): {}. Retrying in {} seconds...",
                                attempt, max_retries, e, retry_delay
                            );
                            sleep(Duration::from_secs(retry_delay)).await;
                            continue;
                        }
                        break;
                    }
                };

                // The API answers with a single entry or an array of entries
                let entry = info.pointer("/0").unwrap_or(&info);
                let uri = entry
                    .get("uri")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string());

                match uri {
                    Some(uri) => {
                        debug!("Successfully uploaded document to Grove: {}", uri);
                        return Ok(UploadReceipt {
                            uri,
                            gateway_url: entry
                                .get("gateway_url")
                                .and_then(Value::as_str)
                                .map(|s| s.to_string()),
                            storage_key: entry
                                .get("storage_key")
                                .and_then(Value::as_str)
                                .map(|s| s.to_string()),
                        });
                    }
                    None => {
                        return Err(StorageError::MalformedResponse(format!(
                            "no uri in upload response: {}",
                            info
                        )));
                    }
                }
            }

            let status_text = status.canonical_reason().unwrap_or("Unknown error");
            last_error = format!("status {} {}", status, status_text);

            if status.is_server_error() && attempt < max_retries {
                let retry_delay = BASE_RETRY_DELAY_SECS * 2_u64.pow(attempt - 1);
                warn!(
                    "Grove returned error {} {} (attempt {}/{}). Retrying in {} seconds...",
                    status, status_text, attempt, max_retries, retry_delay
                );
                sleep(Duration::from_secs(retry_delay)).await;
                continue;
            }

            // Client errors indicate a bad request or ACL problem that a
            // retry will not resolve.
            error!(
                "Grove upload failed with {} {}. Not retrying.",
                status, status_text
            );
            return Err(StorageError::Upload {
                attempts: attempt,
                reason: last_error,
            });
        }

        error!(
            "Grove upload failed after {} attempts: {}",
            max_retries, last_error
        );
        Err(StorageError::Upload {
            attempts: max_retries,
            reason: last_error,
        })
    }

    /// Fetch a blob by its logical URI and parse it as JSON.
    ///
    /// No automatic retry: a transient failure is surfaced to the caller as
    /// `StorageError::Fetch` so it can be told apart from an empty document.
    pub async fn fetch_json(&self, uri: &str) -> Result<Value, StorageError> {
        let url = self.resolve_url(uri)?;
        debug!("Fetching {} via {}", uri, url);
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::Fetch {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Fetch completed in {:?}", start.elapsed());

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Fetch {
                uri: uri.to_string(),
                reason: format!(
                    "status {} {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown error")
                ),
            });
        }

        response.json().await.map_err(|e| StorageError::Fetch {
            uri: uri.to_string(),
            reason: format!("invalid JSON body: {}", e),
        })
    }

    /// Resolve a logical storage URI to a fetchable gateway URL.
    ///
    /// `lens://<key>` maps to `<gateway_url>/<key>`; plain http(s) URLs pass
    /// through unchanged.
    pub fn resolve_url(&self, uri: &str) -> Result<String, StorageError> {
        if uri.is_empty() {
            return Err(StorageError::InvalidUri {
                uri: uri.to_string(),
                reason: "URI is empty".to_string(),
            });
        }
        if let Some(key) = uri.strip_prefix("lens://") {
            if key.is_empty() {
                return Err(StorageError::InvalidUri {
                    uri: uri.to_string(),
                    reason: "missing storage key".to_string(),
                });
            }
            return Ok(format!(
                "{}/{}",
                self.config.gateway_url.trim_end_matches('/'),
                key
            ));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(uri.to_string());
        }
        Err(StorageError::InvalidUri {
            uri: uri.to_string(),
            reason: "unsupported scheme".to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for GroveClient {
    async fn upload_json(
        &self,
        document: &Value,
        acl: &AccessControl,
    ) -> Result<UploadReceipt, StorageError> {
        GroveClient::upload_json(self, document, acl).await
    }

    async fn fetch_json(&self, uri: &str) -> Result<Value, StorageError> {
        GroveClient::fetch_json(self, uri).await
    }

    fn store_name(&self) -> &'static str {
        "grove"
    }
}
