//! Typed collection database over immutable blob storage
//!
//! The backend only supports upload-and-get-URI, so every "table" is a
//! whole JSON document re-uploaded on each mutation, with a registry
//! mapping collection names to their current content address. This crate
//! layers a TTL-cached read path, a read-modify-write mutation helper, and
//! typed accessors for users, repositories, NFTs and the activity log on
//! top of that.

pub mod activities;
pub mod collections;
pub mod error;
pub mod model;
pub mod nfts;
pub mod registry;
pub mod repositories;
pub mod users;

pub use collections::CollectionStore;
pub use error::DbError;
pub use model::{
    Activity, ActivityKind, CollectionKind, NewNft, NewRepository, NewUser, Nft,
    REPUTATION_PER_MINT, Repository, User,
};
pub use registry::{HttpRegistry, MemoryRegistry, RegistryBackend, RegistryConfig, UriRegistry};

use std::sync::Arc;
use storage::{BlobStore, FetchCache};

/// Typed accessors over the collection store.
///
/// Construct one `Db` at process start with a shared cache and registry
/// and pass it to everything that reads or writes collections. The
/// accessor methods live in the per-collection modules.
pub struct Db {
    collections: CollectionStore,
}

impl Db {
    pub fn new(
        store: Arc<dyn BlobStore>,
        cache: Arc<FetchCache>,
        registry: Arc<UriRegistry>,
    ) -> Self {
        Self {
            collections: CollectionStore::new(store, cache, registry),
        }
    }

    pub fn collections(&self) -> &CollectionStore {
        &self.collections
    }
}
