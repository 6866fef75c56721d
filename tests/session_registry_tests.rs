//! Integration tests for refresh-session bookkeeping and the expiry sweeper.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use school_auth::auth::session::{SessionRegistry, SessionSweeper, hash_token};
use school_auth::models::Session;
use school_auth::repositories::SessionRepository;
use sea_orm::{DatabaseConnection, EntityTrait};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

const TIMEOUT: StdDuration = StdDuration::from_secs(5);

async fn setup() -> (DatabaseConnection, Uuid) {
    let db = test_utils::setup_test_db().await.unwrap();
    let tenant = test_utils::create_test_tenant(&db, "sessions.example.edu")
        .await
        .unwrap();
    let user = test_utils::insert_user(&db, tenant.id, "pupil@example.edu", None)
        .await
        .unwrap();
    (db, user.id)
}

#[tokio::test]
async fn test_created_session_is_valid_and_stores_only_digest() {
    let (db, user_id) = setup().await;
    let registry = SessionRegistry::new(db.clone(), Duration::days(7), TIMEOUT);

    let session = registry.create(user_id, "refresh-token-1").await.unwrap();

    assert_eq!(session.token_hash, hash_token("refresh-token-1"));
    assert_ne!(session.token_hash, "refresh-token-1");
    assert!(session.expires_at > Utc::now() + Duration::days(6));
    assert!(registry.is_valid("refresh-token-1").await.unwrap());
    assert!(!registry.is_valid("some-other-token").await.unwrap());
}

#[tokio::test]
async fn test_invalidate_removes_session_once() {
    let (db, user_id) = setup().await;
    let registry = SessionRegistry::new(db.clone(), Duration::days(7), TIMEOUT);
    registry.create(user_id, "refresh-token-2").await.unwrap();

    assert!(registry.invalidate("refresh-token-2").await.unwrap());
    assert!(!registry.invalidate("refresh-token-2").await.unwrap());
    assert!(!registry.is_valid("refresh-token-2").await.unwrap());
}

#[tokio::test]
async fn test_invalidate_unknown_token_is_not_an_error() {
    let (db, _) = setup().await;
    let registry = SessionRegistry::new(db, Duration::days(7), TIMEOUT);

    assert!(!registry.invalidate("never-issued").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_invalidation_succeeds_at_most_once() {
    let (db, user_id) = setup().await;
    let registry = Arc::new(SessionRegistry::new(db, Duration::days(7), TIMEOUT));
    registry.create(user_id, "contended-token").await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.invalidate("contended-token").await.unwrap() })
        })
        .collect();

    let mut removed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            removed += 1;
        }
    }
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn test_expired_session_is_invalid_and_swept() {
    let (db, user_id) = setup().await;
    let registry = SessionRegistry::new(db.clone(), Duration::days(7), TIMEOUT);
    let repo = SessionRepository::new(&db);
    repo.insert(
        user_id,
        hash_token("stale-token"),
        Utc::now() - Duration::minutes(1),
    )
    .await
    .unwrap();
    registry.create(user_id, "live-token").await.unwrap();

    assert!(!registry.is_valid("stale-token").await.unwrap());
    // An expired row cannot be revoked; it is left for the sweeper.
    assert!(!registry.invalidate("stale-token").await.unwrap());

    assert_eq!(registry.sweep_expired().await.unwrap(), 1);
    assert_eq!(repo.count_for_user(user_id).await.unwrap(), 1);
    assert!(registry.is_valid("live-token").await.unwrap());
    assert_eq!(registry.sweep_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sessions_are_independent_per_token() {
    let (db, user_id) = setup().await;
    let registry = SessionRegistry::new(db.clone(), Duration::days(7), TIMEOUT);
    registry.create(user_id, "device-a").await.unwrap();
    registry.create(user_id, "device-b").await.unwrap();

    registry.invalidate("device-a").await.unwrap();

    assert!(!registry.is_valid("device-a").await.unwrap());
    assert!(registry.is_valid("device-b").await.unwrap());
    assert_eq!(
        SessionRepository::new(&db)
            .count_for_user(user_id)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_sweeper_removes_expired_sessions_and_stops_on_cancel() {
    let (db, user_id) = setup().await;
    SessionRepository::new(&db)
        .insert(
            user_id,
            hash_token("old-token"),
            Utc::now() - Duration::hours(1),
        )
        .await
        .unwrap();
    let registry = Arc::new(SessionRegistry::new(db.clone(), Duration::days(7), TIMEOUT));

    let shutdown = CancellationToken::new();
    let handle =
        SessionSweeper::new(registry, StdDuration::from_millis(20)).spawn(shutdown.clone());

    let mut remaining = usize::MAX;
    for _ in 0..50 {
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        remaining = Session::find().all(&db).await.unwrap().len();
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0);

    shutdown.cancel();
    tokio::time::timeout(StdDuration::from_secs(2), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();
}
