use db::{
    ActivityKind, Db, MemoryRegistry, NewNft, NewRepository, NewUser, REPUTATION_PER_MINT,
    UriRegistry,
};
use serde_json::json;
use std::sync::Arc;
use storage::{AccessControl, DEFAULT_TTL, FetchCache, ManualClock, MemoryStore};

const WALLET: &str = "0xAbCd000000000000000000000000000000000001";

struct Fixture {
    db: Db,
    store: Arc<MemoryStore>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(FetchCache::new(DEFAULT_TTL, clock));
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(MemoryRegistry::new());
    let registry = Arc::new(UriRegistry::new(backend));
    let db = Db::new(store.clone(), cache, registry);
    Fixture { db, store }
}

fn writer() -> AccessControl {
    AccessControl::wallet(WALLET, 37111)
}

async fn user_with_wallet(db: &Db, wallet: &str) -> db::User {
    db.add_user(
        NewUser {
            wallet_address: Some(wallet.to_string()),
            github_username: Some(format!("dev-{}", &wallet[2..6])),
            ..NewUser::default()
        },
        &writer(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn looks_up_users_by_natural_keys() {
    let f = fixture();
    let user = user_with_wallet(&f.db, WALLET).await;

    // Wallet comparison is case-insensitive
    let by_wallet = f
        .db
        .get_user_by_wallet_address(&WALLET.to_lowercase())
        .await
        .unwrap();
    assert_eq!(by_wallet.as_ref(), Some(&user));

    let by_github = f
        .db
        .get_user_by_github_username(user.github_username.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(by_github.as_ref(), Some(&user));

    let by_id = f.db.get_user_by_id(user.id).await.unwrap();
    assert_eq!(by_id, Some(user));

    assert_eq!(f.db.get_user_by_id(999).await.unwrap(), None);
    assert_eq!(
        f.db.get_user_by_wallet_address("0xunknown").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn follow_detection_scans_the_activity_log() {
    let f = fixture();
    user_with_wallet(&f.db, WALLET).await;

    let followed = f
        .db
        .follow_repository(WALLET, "a/b", &writer())
        .await
        .unwrap();
    assert!(followed.is_some());

    assert!(f.db.is_following_repository(WALLET, "a/b").await.unwrap());
    assert!(!f.db.is_following_repository(WALLET, "a/c").await.unwrap());
    assert!(
        !f.db
            .is_following_repository("0xother", "a/b")
            .await
            .unwrap()
    );

    // Following twice is a no-op
    assert!(
        f.db.follow_repository(WALLET, "a/b", &writer())
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(f.db.fetch_activities().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unfollow_splices_the_activity_out() {
    let f = fixture();
    user_with_wallet(&f.db, WALLET).await;

    f.db.follow_repository(WALLET, "a/b", &writer())
        .await
        .unwrap();
    f.db.follow_repository(WALLET, "c/d", &writer())
        .await
        .unwrap();

    assert!(
        f.db.unfollow_repository(WALLET, "a/b", &writer())
            .await
            .unwrap()
    );
    assert!(!f.db.is_following_repository(WALLET, "a/b").await.unwrap());
    assert!(f.db.is_following_repository(WALLET, "c/d").await.unwrap());

    // Nothing left to remove
    assert!(
        !f.db
            .unfollow_repository(WALLET, "a/b", &writer())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn user_follows_ignore_self_and_duplicates() {
    let f = fixture();
    let follower = user_with_wallet(&f.db, WALLET).await;
    let target = user_with_wallet(&f.db, "0xBbBb000000000000000000000000000000000002").await;

    assert!(
        f.db.follow_user(WALLET, follower.id, &writer())
            .await
            .unwrap()
            .is_none(),
        "self-follow is a no-op"
    );

    assert!(
        f.db.follow_user(WALLET, target.id, &writer())
            .await
            .unwrap()
            .is_some()
    );
    assert!(f.db.is_following_user(WALLET, target.id).await.unwrap());
    assert!(
        f.db.follow_user(WALLET, target.id, &writer())
            .await
            .unwrap()
            .is_none()
    );

    assert!(f.db.unfollow_user(WALLET, target.id, &writer()).await.unwrap());
    assert!(!f.db.is_following_user(WALLET, target.id).await.unwrap());
}

#[tokio::test]
async fn repository_nft_counter_increments_on_save() {
    let f = fixture();
    let user = user_with_wallet(&f.db, WALLET).await;

    let repo = f
        .db
        .add_repository(
            NewRepository {
                user_id: user.id,
                name: "octo/repo".to_string(),
                language: Some("Rust".to_string()),
                ..NewRepository::default()
            },
            &writer(),
        )
        .await
        .unwrap();
    assert_eq!(repo.nft_count, 0);

    assert!(
        f.db.update_repository_nft_count("octo/repo", &writer())
            .await
            .unwrap()
    );
    let reloaded = f
        .db
        .get_repository_by_name("octo/repo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.nft_count, 1);

    // Unknown repositories are reported without rewriting the collection
    let uploads_before = f.store.upload_count();
    assert!(
        !f.db
            .update_repository_nft_count("missing/repo", &writer())
            .await
            .unwrap()
    );
    assert_eq!(f.store.upload_count(), uploads_before);
}

#[tokio::test]
async fn minting_awards_the_reputation_bonus() {
    let f = fixture();
    let user = user_with_wallet(&f.db, WALLET).await;
    assert_eq!(user.reputation, 0);

    assert!(
        f.db.update_user_after_minting(WALLET, &writer())
            .await
            .unwrap()
    );
    let reloaded = f.db.get_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(reloaded.reputation, REPUTATION_PER_MINT);

    assert!(
        !f.db
            .update_user_after_minting("0xunknown", &writer())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn mint_detection_scans_the_nft_collection() {
    let f = fixture();
    let user = user_with_wallet(&f.db, WALLET).await;

    f.db.add_nft(
        NewNft {
            user_id: user.id,
            repository_name: "octo/repo".to_string(),
            ..NewNft::default()
        },
        &writer(),
    )
    .await
    .unwrap();

    assert!(
        f.db.has_user_minted_nft_for_repo(user.id, "octo/repo")
            .await
            .unwrap()
    );
    assert!(
        !f.db
            .has_user_minted_nft_for_repo(user.id, "other/repo")
            .await
            .unwrap()
    );
    assert!(
        !f.db
            .has_user_minted_nft_for_repo(999, "octo/repo")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn mint_flow_touches_every_collection() {
    let f = fixture();
    let user = user_with_wallet(&f.db, WALLET).await;
    f.db.add_repository(
        NewRepository {
            user_id: user.id,
            name: "octo/repo".to_string(),
            ..NewRepository::default()
        },
        &writer(),
    )
    .await
    .unwrap();

    let nft = f
        .db
        .mint_nft(
            NewNft {
                user_id: user.id,
                repository_name: "octo/repo".to_string(),
                tx_hash: Some("0xdeadbeef".to_string()),
                rarity: Some("rare".to_string()),
                tags: vec!["rust".to_string()],
                ..NewNft::default()
            },
            &writer(),
        )
        .await
        .unwrap();

    assert_eq!(f.db.get_nfts_by_user_id(user.id).await.unwrap(), vec![nft]);

    let repo = f
        .db
        .get_repository_by_name("octo/repo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(repo.nft_count, 1);

    let reloaded = f.db.get_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(reloaded.reputation, REPUTATION_PER_MINT);

    let activities = f.db.get_activities_by_user_id(user.id).await.unwrap();
    assert_eq!(activities.len(), 1);
    assert!(matches!(
        &activities[0].kind,
        ActivityKind::NftMint { repository_name, .. } if repository_name == "octo/repo"
    ));
}

#[tokio::test]
async fn rows_that_fail_to_deserialize_are_skipped() {
    let f = fixture();
    let user = user_with_wallet(&f.db, WALLET).await;

    // Wedge a garbage row into the stored collection next to a valid one
    f.db.collections()
        .mutate(db::CollectionKind::Users, &writer(), |mut rows| {
            rows.push(json!({"bogus": true}));
            rows
        })
        .await
        .unwrap();

    let users = f.db.fetch_users().await.unwrap();
    assert_eq!(users, vec![user]);
}
