//! Activity log accessors
//!
//! The log is append-only, with one exception: removing a follow splices
//! the matching entry out of the array. "Is X following Y" is answered by
//! scanning the log for a matching follow-type entry, keyed by the user id
//! resolved from the caller's wallet.

use chrono::Utc;
use serde_json::Value;
use storage::AccessControl;
use tracing::debug;

use crate::collections::next_id;
use crate::error::DbError;
use crate::model::{Activity, ActivityKind, CollectionKind};
use crate::Db;

fn is_repo_follow(row: &Value, user_id: u64, repository_name: &str) -> bool {
    row.get("type").and_then(Value::as_str) == Some("repo_follow")
        && row.get("user_id").and_then(Value::as_u64) == Some(user_id)
        && row.get("repository_name").and_then(Value::as_str) == Some(repository_name)
}

fn is_user_follow(row: &Value, user_id: u64, target_user_id: u64) -> bool {
    row.get("type").and_then(Value::as_str) == Some("user_follow")
        && row.get("user_id").and_then(Value::as_u64) == Some(user_id)
        && row.get("target_user_id").and_then(Value::as_u64) == Some(target_user_id)
}

impl Db {
    pub async fn fetch_activities(&self) -> Result<Vec<Activity>, DbError> {
        self.collections().load_as(CollectionKind::Activities).await
    }

    /// Append an activity entry, auto-assigning its id
    pub async fn add_activity(
        &self,
        user_id: u64,
        kind: ActivityKind,
        writer: &AccessControl,
    ) -> Result<Activity, DbError> {
        let rows = self.collections().load(CollectionKind::Activities).await?;
        let activity = Activity {
            id: next_id(&rows),
            user_id,
            created_at: Utc::now(),
            kind,
        };
        self.collections()
            .append(CollectionKind::Activities, writer, &activity)
            .await?;
        debug!("Added activity {} for user {}", activity.id, user_id);
        Ok(activity)
    }

    pub async fn get_activities_by_user_id(
        &self,
        user_id: u64,
    ) -> Result<Vec<Activity>, DbError> {
        Ok(self
            .fetch_activities()
            .await?
            .into_iter()
            .filter(|a| a.user_id == user_id)
            .collect())
    }

    /// True iff a `repo_follow` entry exists for the wallet's user and
    /// this repository. An unknown wallet is simply not following.
    pub async fn is_following_repository(
        &self,
        wallet: &str,
        repository_name: &str,
    ) -> Result<bool, DbError> {
        let Some(user) = self.get_user_by_wallet_address(wallet).await? else {
            return Ok(false);
        };
        Ok(self.fetch_activities().await?.iter().any(|a| {
            a.user_id == user.id
                && matches!(
                    &a.kind,
                    ActivityKind::RepoFollow { repository_name: name } if name == repository_name
                )
        }))
    }

    pub async fn is_following_user(
        &self,
        wallet: &str,
        target_user_id: u64,
    ) -> Result<bool, DbError> {
        let Some(user) = self.get_user_by_wallet_address(wallet).await? else {
            return Ok(false);
        };
        Ok(self.fetch_activities().await?.iter().any(|a| {
            a.user_id == user.id
                && matches!(
                    a.kind,
                    ActivityKind::UserFollow { target_user_id: target } if target == target_user_id
                )
        }))
    }

    /// Record a repository follow for the wallet's user.
    ///
    /// Returns `Ok(None)` when the wallet is unknown or the follow already
    /// exists; following is idempotent.
    pub async fn follow_repository(
        &self,
        wallet: &str,
        repository_name: &str,
        writer: &AccessControl,
    ) -> Result<Option<Activity>, DbError> {
        let Some(user) = self.get_user_by_wallet_address(wallet).await? else {
            return Ok(None);
        };
        if self.is_following_repository(wallet, repository_name).await? {
            return Ok(None);
        }
        let activity = self
            .add_activity(
                user.id,
                ActivityKind::RepoFollow {
                    repository_name: repository_name.to_string(),
                },
                writer,
            )
            .await?;
        Ok(Some(activity))
    }

    /// Splice the matching follow entry out of the log.
    ///
    /// Returns `Ok(false)` without writing when there is nothing to remove.
    pub async fn unfollow_repository(
        &self,
        wallet: &str,
        repository_name: &str,
        writer: &AccessControl,
    ) -> Result<bool, DbError> {
        let Some(user) = self.get_user_by_wallet_address(wallet).await? else {
            return Ok(false);
        };
        if !self.is_following_repository(wallet, repository_name).await? {
            return Ok(false);
        }

        let mut removed = false;
        self.collections()
            .mutate(CollectionKind::Activities, writer, |mut rows| {
                if let Some(pos) = rows
                    .iter()
                    .position(|row| is_repo_follow(row, user.id, repository_name))
                {
                    rows.remove(pos);
                    removed = true;
                }
                rows
            })
            .await?;

        Ok(removed)
    }

    /// Record a user follow. Self-follows and duplicates are no-ops.
    pub async fn follow_user(
        &self,
        wallet: &str,
        target_user_id: u64,
        writer: &AccessControl,
    ) -> Result<Option<Activity>, DbError> {
        let Some(user) = self.get_user_by_wallet_address(wallet).await? else {
            return Ok(None);
        };
        if user.id == target_user_id {
            return Ok(None);
        }
        if self.is_following_user(wallet, target_user_id).await? {
            return Ok(None);
        }
        let activity = self
            .add_activity(
                user.id,
                ActivityKind::UserFollow { target_user_id },
                writer,
            )
            .await?;
        Ok(Some(activity))
    }

    pub async fn unfollow_user(
        &self,
        wallet: &str,
        target_user_id: u64,
        writer: &AccessControl,
    ) -> Result<bool, DbError> {
        let Some(user) = self.get_user_by_wallet_address(wallet).await? else {
            return Ok(false);
        };
        if !self.is_following_user(wallet, target_user_id).await? {
            return Ok(false);
        }

        let mut removed = false;
        self.collections()
            .mutate(CollectionKind::Activities, writer, |mut rows| {
                if let Some(pos) = rows
                    .iter()
                    .position(|row| is_user_follow(row, user.id, target_user_id))
                {
                    rows.remove(pos);
                    removed = true;
                }
                rows
            })
            .await?;

        Ok(removed)
    }
}
