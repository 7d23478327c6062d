//! Repository accessors

use chrono::Utc;
use serde_json::Value;
use storage::AccessControl;
use tracing::debug;

use crate::collections::next_id;
use crate::error::DbError;
use crate::model::{CollectionKind, NewRepository, Repository};
use crate::Db;

impl Db {
    pub async fn fetch_repositories(&self) -> Result<Vec<Repository>, DbError> {
        self.collections()
            .load_as(CollectionKind::Repositories)
            .await
    }

    /// Append a new repository, auto-assigning its id
    pub async fn add_repository(
        &self,
        new: NewRepository,
        writer: &AccessControl,
    ) -> Result<Repository, DbError> {
        let rows = self
            .collections()
            .load(CollectionKind::Repositories)
            .await?;
        let repository = Repository {
            id: next_id(&rows),
            user_id: new.user_id,
            name: new.name,
            description: new.description,
            language: new.language,
            nft_count: 0,
            created_at: Utc::now(),
        };
        self.collections()
            .append(CollectionKind::Repositories, writer, &repository)
            .await?;
        debug!("Added repository {} ({})", repository.id, repository.name);
        Ok(repository)
    }

    pub async fn get_repository_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Repository>, DbError> {
        Ok(self
            .fetch_repositories()
            .await?
            .into_iter()
            .find(|r| r.name == name))
    }

    /// The `user_id` foreign key is not referentially enforced; an unknown
    /// user simply yields an empty result.
    pub async fn get_repositories_by_user_id(
        &self,
        user_id: u64,
    ) -> Result<Vec<Repository>, DbError> {
        Ok(self
            .fetch_repositories()
            .await?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect())
    }

    /// Bump the denormalized NFT counter of the named repository.
    ///
    /// Returns `Ok(false)` without writing when the repository is unknown.
    /// The counter is a stored value updated by full-collection rewrite,
    /// so it can lag behind the NFT collection under concurrent writers.
    pub async fn update_repository_nft_count(
        &self,
        name: &str,
        writer: &AccessControl,
    ) -> Result<bool, DbError> {
        if self.get_repository_by_name(name).await?.is_none() {
            return Ok(false);
        }

        let mut updated = false;
        self.collections()
            .mutate(CollectionKind::Repositories, writer, |mut rows| {
                for row in rows.iter_mut() {
                    if row.get("name").and_then(Value::as_str) == Some(name) {
                        let count = row.get("nft_count").and_then(Value::as_u64).unwrap_or(0);
                        row["nft_count"] = Value::from(count + 1);
                        updated = true;
                        break;
                    }
                }
                rows
            })
            .await?;

        Ok(updated)
    }
}
