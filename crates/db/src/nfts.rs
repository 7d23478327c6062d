//! Contribution NFT accessors
//!
//! NFTs reference their repository by denormalized name string, a
//! resolvable but informal association. Once minted an NFT is immutable;
//! there is no update path.

use chrono::Utc;
use storage::AccessControl;
use tracing::{debug, warn};

use crate::collections::next_id;
use crate::error::DbError;
use crate::model::{ActivityKind, CollectionKind, NewNft, Nft};
use crate::Db;

impl Db {
    pub async fn fetch_nfts(&self) -> Result<Vec<Nft>, DbError> {
        self.collections().load_as(CollectionKind::Nfts).await
    }

    /// Append a newly minted NFT, auto-assigning its id
    pub async fn add_nft(&self, new: NewNft, writer: &AccessControl) -> Result<Nft, DbError> {
        let rows = self.collections().load(CollectionKind::Nfts).await?;
        let nft = Nft {
            id: next_id(&rows),
            user_id: new.user_id,
            repository_name: new.repository_name,
            image_uri: new.image_uri,
            tx_hash: new.tx_hash,
            rarity: new.rarity,
            tags: new.tags,
            minted_at: Utc::now(),
        };
        self.collections()
            .append(CollectionKind::Nfts, writer, &nft)
            .await?;
        debug!("Added NFT {} for {}", nft.id, nft.repository_name);
        Ok(nft)
    }

    pub async fn get_nfts_by_user_id(&self, user_id: u64) -> Result<Vec<Nft>, DbError> {
        Ok(self
            .fetch_nfts()
            .await?
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect())
    }

    /// Scan the NFT collection for a mint by this user against this repo
    pub async fn has_user_minted_nft_for_repo(
        &self,
        user_id: u64,
        repository_name: &str,
    ) -> Result<bool, DbError> {
        Ok(self
            .fetch_nfts()
            .await?
            .iter()
            .any(|n| n.user_id == user_id && n.repository_name == repository_name))
    }

    /// Full mint flow: store the NFT, bump the repository's counter, award
    /// the owner's reputation bonus, and log an activity entry.
    ///
    /// Each step is an independent read-modify-write of its own collection;
    /// a failure partway leaves the earlier steps in place.
    pub async fn mint_nft(&self, new: NewNft, writer: &AccessControl) -> Result<Nft, DbError> {
        let nft = self.add_nft(new, writer).await?;

        if !self
            .update_repository_nft_count(&nft.repository_name, writer)
            .await?
        {
            warn!(
                "Minted NFT {} references unknown repository {}",
                nft.id, nft.repository_name
            );
        }

        if let Some(user) = self.get_user_by_id(nft.user_id).await? {
            if let Some(wallet) = user.wallet_address.as_deref() {
                self.update_user_after_minting(wallet, writer).await?;
            }
        }

        self.add_activity(
            nft.user_id,
            ActivityKind::NftMint {
                repository_name: nft.repository_name.clone(),
                tx_hash: nft.tx_hash.clone(),
                rarity: nft.rarity.clone(),
                tags: nft.tags.clone(),
            },
            writer,
        )
        .await?;

        Ok(nft)
    }
}
