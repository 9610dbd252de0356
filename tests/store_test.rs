// ABOUTME: Unit tests for the grant/token store
// ABOUTME: Single-use codes, secondary indexes, rotation, and jti replay cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{Duration, Utc};
use gatehouse::oidc::models::{ProfileClaims, RequestSnapshot};
use gatehouse::store::{CodeLookup, GrantStore, PkceRecord, RefreshLookup, StoreError};

fn snapshot() -> RequestSnapshot {
    RequestSnapshot::new(
        "demo".to_owned(),
        "user-1".to_owned(),
        "alice".to_owned(),
        "http://localhost:9999/cb".to_owned(),
        vec!["openid".to_owned(), "offline_access".to_owned()],
        None,
        ProfileClaims::default(),
    )
}

#[test]
fn code_is_single_use_and_replay_is_distinguishable_from_absence() {
    let store = GrantStore::new();
    let snap = snapshot();
    store.put_authorization_code("sig-1", snap.clone(), Utc::now() + Duration::minutes(10));

    assert!(matches!(
        store.authorization_code("sig-1"),
        Ok(CodeLookup::Active { .. })
    ));
    store.consume_authorization_code("sig-1").unwrap();

    // Second consumption loses, and lookups still return the snapshot
    assert_eq!(
        store.consume_authorization_code("sig-1"),
        Err(StoreError::AlreadyUsed)
    );
    match store.authorization_code("sig-1").unwrap() {
        CodeLookup::Consumed { snapshot } => {
            assert_eq!(snapshot.request_id, snap.request_id);
        }
        CodeLookup::Active { .. } => panic!("consumed code reported active"),
    }

    // Absence is a different signal entirely
    assert_eq!(
        store.authorization_code("missing"),
        Err(StoreError::NotFound)
    );
}

#[test]
fn access_tokens_are_revocable_by_request_id() {
    let store = GrantStore::new();
    let snap = snapshot();
    store.put_access_token("at-1", snap.clone(), Utc::now() + Duration::minutes(30));

    assert!(store.access_token("at-1").is_ok());
    store.revoke_access_token(&snap.request_id);
    assert_eq!(store.access_token("at-1"), Err(StoreError::NotFound));

    // Revoking an empty chain is a no-op
    store.revoke_access_token(&snap.request_id);
}

#[test]
fn index_tracks_the_current_signature_per_grant() {
    let store = GrantStore::new();
    let snap = snapshot();
    let expires = Utc::now() + Duration::minutes(30);

    store.put_access_token("at-old", snap.clone(), expires);
    store.put_access_token("at-new", snap.clone(), expires);

    // Deleting a superseded signature must not clear the index entry
    store.delete_access_token("at-old");
    store.revoke_access_token(&snap.request_id);
    assert_eq!(store.access_token("at-new"), Err(StoreError::NotFound));
}

#[test]
fn rotation_revokes_the_prior_pair() {
    let store = GrantStore::new();
    let snap = snapshot();
    let now = Utc::now();

    store.put_access_token("at-1", snap.clone(), now + Duration::minutes(30));
    store.put_refresh_token("rt-1", "at-1", snap.clone(), now + Duration::hours(24));

    store.rotate(&snap.request_id);

    assert_eq!(store.access_token("at-1"), Err(StoreError::NotFound));
    match store.refresh_token("rt-1").unwrap() {
        RefreshLookup::Revoked { snapshot } => {
            assert_eq!(snapshot.request_id, snap.request_id);
        }
        RefreshLookup::Active { .. } => panic!("rotated refresh token reported active"),
    }

    // Replacements under the same request id become the current pair
    store.put_access_token("at-2", snap.clone(), now + Duration::minutes(30));
    store.put_refresh_token("rt-2", "at-2", snap.clone(), now + Duration::hours(24));
    assert!(matches!(
        store.refresh_token("rt-2"),
        Ok(RefreshLookup::Active { .. })
    ));
    assert!(store.access_token("at-2").is_ok());
}

#[test]
fn pkce_and_continuations_are_consumed_on_take() {
    let store = GrantStore::new();
    store.put_pkce(
        "code-sig",
        PkceRecord {
            challenge: "challenge".to_owned(),
            method: "S256".to_owned(),
        },
    );
    store.put_continuation("code-sig", snapshot());

    assert!(store.take_pkce("code-sig").is_some());
    assert!(store.take_pkce("code-sig").is_none());
    assert!(store.take_continuation("code-sig").is_some());
    assert!(store.take_continuation("code-sig").is_none());
}

#[test]
fn jti_replay_is_rejected_until_expiry() {
    let store = GrantStore::new();
    let future = Utc::now() + Duration::minutes(5);

    store.mark_jti_used("jti-1", future).unwrap();
    assert_eq!(
        store.mark_jti_used("jti-1", future),
        Err(StoreError::AlreadyUsed)
    );

    // An expired entry is reaped and its jti becomes usable again
    let past = Utc::now() - Duration::minutes(5);
    store.mark_jti_used("jti-2", past).unwrap();
    store.mark_jti_used("jti-2", future).unwrap();
}

#[test]
fn concurrent_consumption_admits_exactly_one_winner() {
    use std::sync::Arc;

    let store = Arc::new(GrantStore::new());
    store.put_authorization_code("race", snapshot(), Utc::now() + Duration::minutes(10));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || store.consume_authorization_code("race").is_ok())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}
