//! Entity types stored in the collection documents
//!
//! Every collection is a single JSON document `{ "<name>": [entity, ...] }`
//! at a content-addressed URI. Records loaded from the store default
//! missing optional fields instead of failing, since the backend enforces
//! no schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reputation awarded to a user each time they mint a contribution NFT
pub const REPUTATION_PER_MINT: u64 = 10;

/// The named logical tables of the pseudo-database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Users,
    Repositories,
    Nfts,
    Activities,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::Users,
        CollectionKind::Repositories,
        CollectionKind::Nfts,
        CollectionKind::Activities,
    ];

    /// Wrapper key of the collection document, also its registry name
    pub fn key(&self) -> &'static str {
        match self {
            CollectionKind::Users => "users",
            CollectionKind::Repositories => "repositories",
            CollectionKind::Nfts => "nfts",
            CollectionKind::Activities => "activities",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Identity record. The wallet address and GitHub username are optional
/// unique natural keys; `reputation` only ever increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub reputation: u64,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user; id, reputation and timestamp are assigned
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub wallet_address: Option<String>,
    pub github_username: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

/// Repository record, owned by one user. `name` is the full `owner/repo`
/// string; `nft_count` is a denormalized counter bumped whenever an NFT
/// references the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub user_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub nft_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRepository {
    pub user_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
}

/// Contribution NFT. References its repository by name rather than id;
/// immutable once minted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nft {
    pub id: u64,
    pub user_id: u64,
    pub repository_name: String,
    #[serde(default)]
    pub image_uri: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub minted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewNft {
    pub user_id: u64,
    pub repository_name: String,
    pub image_uri: Option<String>,
    pub tx_hash: Option<String>,
    pub rarity: Option<String>,
    pub tags: Vec<String>,
}

/// Entry in the append-only activity log.
///
/// Follow edges are activity rows, not a dedicated edge table: "is user X
/// following repo Y" is answered by scanning the log for a matching
/// `repo_follow` entry. Follow removal is the one delete path — it splices
/// the matching row out of the array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: u64,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    NftMint {
        repository_name: String,
        #[serde(default)]
        tx_hash: Option<String>,
        #[serde(default)]
        rarity: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
    },
    RepoFollow {
        repository_name: String,
    },
    UserFollow {
        target_user_id: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_serializes_with_type_tag() {
        let activity = Activity {
            id: 3,
            user_id: 7,
            created_at: "2024-05-01T12:00:00Z".parse().unwrap(),
            kind: ActivityKind::RepoFollow {
                repository_name: "a/b".to_string(),
            },
        };

        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["type"], "repo_follow");
        assert_eq!(value["repository_name"], "a/b");
        assert_eq!(value["user_id"], 7);

        let back: Activity = serde_json::from_value(value).unwrap();
        assert_eq!(back, activity);
    }

    #[test]
    fn nft_mint_activity_round_trips() {
        let activity = Activity {
            id: 1,
            user_id: 2,
            created_at: "2024-05-01T12:00:00Z".parse().unwrap(),
            kind: ActivityKind::NftMint {
                repository_name: "octo/repo".to_string(),
                tx_hash: Some("0xdeadbeef".to_string()),
                rarity: Some("rare".to_string()),
                tags: vec!["rust".to_string()],
            },
        };

        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["type"], "nft_mint");

        let back: Activity = serde_json::from_value(value).unwrap();
        assert_eq!(back, activity);
    }

    #[test]
    fn user_defaults_missing_optional_fields() {
        let value = json!({
            "id": 5,
            "created_at": "2024-01-01T00:00:00Z",
        });

        let user: User = serde_json::from_value(value).unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(user.reputation, 0);
        assert_eq!(user.wallet_address, None);
        assert_eq!(user.bio, None);
    }

    #[test]
    fn repository_defaults_nft_count_to_zero() {
        let value = json!({
            "id": 1,
            "user_id": 2,
            "name": "a/b",
            "created_at": "2024-01-01T00:00:00Z",
        });

        let repo: Repository = serde_json::from_value(value).unwrap();
        assert_eq!(repo.nft_count, 0);
        assert_eq!(repo.language, None);
    }

    #[test]
    fn date_strings_coerce_to_utc_datetimes() {
        let value = json!({
            "id": 1,
            "user_id": 2,
            "repository_name": "a/b",
            "minted_at": "2024-06-15T08:30:00+02:00",
        });

        let nft: Nft = serde_json::from_value(value).unwrap();
        assert_eq!(nft.minted_at.to_rfc3339(), "2024-06-15T06:30:00+00:00");
    }
}
