//! Integration tests for the refresh-token ledger.

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use warden_core::models::refresh_token::CreateRefreshToken;
use warden_core::repository::RefreshTokenRepository;
use warden_db::{Store, hash_refresh_token};

async fn store() -> Store<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    Store::new(db)
}

fn token(user_id: Uuid, raw: &str, ttl: Duration) -> CreateRefreshToken {
    CreateRefreshToken {
        user_id,
        token: raw.into(),
        expires_at: Utc::now() + ttl,
    }
}

#[tokio::test]
async fn issued_token_is_stored_hashed_and_valid() {
    let store = store().await;
    let ledger = store.system().refresh_tokens();
    let user_id = Uuid::new_v4();

    let issued = ledger
        .issue(token(user_id, "raw-token", Duration::days(7)))
        .await
        .unwrap();
    assert_eq!(issued.token_hash, hash_refresh_token("raw-token"));
    assert_ne!(issued.token_hash, "raw-token");

    let found = ledger.find_valid("raw-token").await.unwrap().unwrap();
    assert_eq!(found.id, issued.id);
    assert_eq!(found.user_id, user_id);
    assert!(ledger.find_valid("other-token").await.unwrap().is_none());
}

#[tokio::test]
async fn revoked_token_is_no_longer_valid() {
    let store = store().await;
    let ledger = store.system().refresh_tokens();

    ledger
        .issue(token(Uuid::new_v4(), "raw-token", Duration::days(7)))
        .await
        .unwrap();
    assert!(ledger.revoke("raw-token").await.unwrap());
    assert!(ledger.find_valid("raw-token").await.unwrap().is_none());
    assert!(!ledger.revoke("never-issued").await.unwrap());
}

#[tokio::test]
async fn expired_token_is_invalid_and_cleaned_up() {
    let store = store().await;
    let ledger = store.system().refresh_tokens();
    let user_id = Uuid::new_v4();

    ledger
        .issue(token(user_id, "stale", -Duration::minutes(1)))
        .await
        .unwrap();
    ledger
        .issue(token(user_id, "fresh", Duration::days(1)))
        .await
        .unwrap();

    assert!(ledger.find_valid("stale").await.unwrap().is_none());
    assert_eq!(ledger.cleanup_expired().await.unwrap(), 1);
    assert_eq!(ledger.cleanup_expired().await.unwrap(), 0);
    assert!(ledger.find_valid("fresh").await.unwrap().is_some());
}

#[tokio::test]
async fn revoke_all_counts_only_live_tokens() {
    let store = store().await;
    let ledger = store.system().refresh_tokens();
    let user_id = Uuid::new_v4();
    let other = Uuid::new_v4();

    for raw in ["a", "b", "c"] {
        ledger
            .issue(token(user_id, raw, Duration::days(1)))
            .await
            .unwrap();
    }
    ledger
        .issue(token(other, "d", Duration::days(1)))
        .await
        .unwrap();
    ledger.revoke("a").await.unwrap();

    assert_eq!(ledger.revoke_all_for_user(user_id).await.unwrap(), 2);
    assert_eq!(ledger.revoke_all_for_user(user_id).await.unwrap(), 0);
    assert!(ledger.find_valid("d").await.unwrap().is_some());
}

#[tokio::test]
async fn rotation_swaps_tokens_atomically() {
    let store = store().await;
    let ledger = store.system().refresh_tokens();
    let user_id = Uuid::new_v4();

    ledger
        .issue(token(user_id, "first", Duration::days(1)))
        .await
        .unwrap();
    let rotated = ledger
        .rotate("first", token(user_id, "second", Duration::days(1)))
        .await
        .unwrap()
        .expect("valid token should rotate");
    assert_eq!(rotated.token_hash, hash_refresh_token("second"));

    assert!(ledger.find_valid("first").await.unwrap().is_none());
    assert!(ledger.find_valid("second").await.unwrap().is_some());

    // Replaying the old token must not mint another one.
    let replay = ledger
        .rotate("first", token(user_id, "third", Duration::days(1)))
        .await
        .unwrap();
    assert!(replay.is_none());
    assert!(ledger.find_valid("third").await.unwrap().is_none());
}
