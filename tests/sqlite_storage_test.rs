// ABOUTME: Tests for the SQLite repository implementations
// ABOUTME: Uniqueness constraints, token lookup, and the user-to-session cascade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{Duration, Utc};
use gatehouse::models::{IdPConnector, LocalSession, User};
use gatehouse::storage::sqlite::SqliteStorage;
use gatehouse::storage::{
    ConnectorRepository, RepositoryError, SessionRepository, UserRepository,
};
use uuid::Uuid;

async fn storage() -> SqliteStorage {
    SqliteStorage::connect("sqlite::memory:").await.unwrap()
}

fn user(username: &str, email: &str) -> User {
    User::new(username.to_owned(), email.to_owned(), "digest".to_owned())
}

fn session_for(user_id: Uuid, token: &str) -> LocalSession {
    LocalSession {
        id: Uuid::new_v4(),
        user_id,
        token: token.to_owned(),
        expires_at: Utc::now() + Duration::hours(24),
    }
}

#[tokio::test]
async fn users_round_trip_with_unique_usernames() {
    let storage = storage().await;
    let alice = user("alice", "alice@example.com");
    UserRepository::create(&storage, &alice).await.unwrap();

    let by_name = storage.by_username("alice").await.unwrap().unwrap();
    assert_eq!(by_name.id, alice.id);
    assert_eq!(by_name.created_at, alice.created_at);
    let by_email = storage.by_email("alice@example.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, alice.id);
    assert!(UserRepository::by_id(&storage, Uuid::new_v4())
        .await
        .unwrap()
        .is_none());

    let dup = user("alice", "other@example.com");
    assert!(matches!(
        UserRepository::create(&storage, &dup).await,
        Err(RepositoryError::Conflict { .. })
    ));
}

#[tokio::test]
async fn deleting_a_user_cascades_to_sessions() {
    let storage = storage().await;
    let alice = user("alice", "alice@example.com");
    UserRepository::create(&storage, &alice).await.unwrap();
    SessionRepository::create(&storage, &session_for(alice.id, "tok-1"))
        .await
        .unwrap();
    SessionRepository::create(&storage, &session_for(alice.id, "tok-2"))
        .await
        .unwrap();

    UserRepository::delete(&storage, alice.id).await.unwrap();
    assert!(storage.by_token("tok-1").await.unwrap().is_none());
    assert!(storage.by_token("tok-2").await.unwrap().is_none());

    // Idempotent
    UserRepository::delete(&storage, alice.id).await.unwrap();
}

#[tokio::test]
async fn session_tokens_are_unique() {
    let storage = storage().await;
    let alice = user("alice", "alice@example.com");
    UserRepository::create(&storage, &alice).await.unwrap();

    SessionRepository::create(&storage, &session_for(alice.id, "tok"))
        .await
        .unwrap();
    assert!(matches!(
        SessionRepository::create(&storage, &session_for(alice.id, "tok")).await,
        Err(RepositoryError::Conflict { .. })
    ));

    storage.delete_for_user(alice.id).await.unwrap();
    assert!(storage.by_token("tok").await.unwrap().is_none());
}

#[tokio::test]
async fn connectors_upsert_and_list_in_order() {
    let storage = storage().await;
    let corp = IdPConnector {
        id: "corp".to_owned(),
        issuer: "https://idp.corp.example".to_owned(),
        client_id: "rp".to_owned(),
        client_secret: "secret".to_owned(),
    };
    storage.put(&corp).await.unwrap();
    storage
        .put(&IdPConnector {
            id: "acme".to_owned(),
            issuer: "https://login.acme.example".to_owned(),
            client_id: "rp2".to_owned(),
            client_secret: "secret2".to_owned(),
        })
        .await
        .unwrap();

    // Upsert replaces in place
    let rotated = IdPConnector {
        client_secret: "rotated".to_owned(),
        ..corp
    };
    storage.put(&rotated).await.unwrap();

    let listed = storage.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "acme");
    assert_eq!(listed[1].id, "corp");
    let fetched = ConnectorRepository::by_id(&storage, "corp")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.client_secret, "rotated");
}
