//! User accessors
//!
//! Lookups are in-memory linear scans over a full collection fetch; the
//! backend has no server-side filtering. Wallet addresses compare
//! case-insensitively since checksummed and lowercase forms of the same
//! address appear interchangeably.

use chrono::Utc;
use serde_json::Value;
use storage::AccessControl;
use tracing::debug;

use crate::collections::next_id;
use crate::error::DbError;
use crate::model::{CollectionKind, NewUser, REPUTATION_PER_MINT, User};
use crate::Db;

fn wallet_matches(row: &Value, wallet: &str) -> bool {
    row.get("wallet_address")
        .and_then(Value::as_str)
        .is_some_and(|address| address.eq_ignore_ascii_case(wallet))
}

impl Db {
    pub async fn fetch_users(&self) -> Result<Vec<User>, DbError> {
        self.collections().load_as(CollectionKind::Users).await
    }

    /// Append a new user, auto-assigning its id
    pub async fn add_user(&self, new: NewUser, writer: &AccessControl) -> Result<User, DbError> {
        let rows = self.collections().load(CollectionKind::Users).await?;
        let user = User {
            id: next_id(&rows),
            wallet_address: new.wallet_address,
            github_username: new.github_username,
            reputation: 0,
            bio: new.bio,
            location: new.location,
            website: new.website,
            created_at: Utc::now(),
        };
        self.collections()
            .append(CollectionKind::Users, writer, &user)
            .await?;
        debug!("Added user {}", user.id);
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: u64) -> Result<Option<User>, DbError> {
        Ok(self.fetch_users().await?.into_iter().find(|u| u.id == id))
    }

    pub async fn get_user_by_wallet_address(
        &self,
        wallet: &str,
    ) -> Result<Option<User>, DbError> {
        Ok(self.fetch_users().await?.into_iter().find(|u| {
            u.wallet_address
                .as_deref()
                .is_some_and(|address| address.eq_ignore_ascii_case(wallet))
        }))
    }

    pub async fn get_user_by_github_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, DbError> {
        Ok(self
            .fetch_users()
            .await?
            .into_iter()
            .find(|u| u.github_username.as_deref() == Some(username)))
    }

    /// Award the minting reputation bonus to the user owning `wallet`.
    ///
    /// Returns `Ok(false)` without writing when no user has that wallet.
    pub async fn update_user_after_minting(
        &self,
        wallet: &str,
        writer: &AccessControl,
    ) -> Result<bool, DbError> {
        if self.get_user_by_wallet_address(wallet).await?.is_none() {
            return Ok(false);
        }

        let mut updated = false;
        self.collections()
            .mutate(CollectionKind::Users, writer, |mut rows| {
                for row in rows.iter_mut() {
                    if wallet_matches(row, wallet) {
                        let reputation = row.get("reputation").and_then(Value::as_u64).unwrap_or(0);
                        row["reputation"] = Value::from(reputation + REPUTATION_PER_MINT);
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
