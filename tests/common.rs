// ABOUTME: Shared test utilities and setup for integration tests
// ABOUTME: Provides engine, store, registry, and repository builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test setup for the gatehouse integration tests. Keeps the
//! expensive pieces (RSA key generation, bcrypt digests) behind `OnceLock`
//! so individual tests stay fast.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use gatehouse::auth::SessionManager;
use gatehouse::clients::{Client, ClientRegistry};
use gatehouse::crypto::keys::SigningKey;
use gatehouse::crypto::password;
use gatehouse::models::User;
use gatehouse::oidc::models::{AuthorizeRequest, TokenRequest};
use gatehouse::oidc::{AuthorizationServer, TokenLifetimes};
use gatehouse::storage::memory::InMemoryStorage;
use gatehouse::store::GrantStore;
use gatehouse::users::UserService;

/// Client used by most tests
pub const TEST_CLIENT_ID: &str = "demo";
/// Its secret, registered as a digest
pub const TEST_CLIENT_SECRET: &str = "demo-secret-please-rotate";
/// Its only registered redirect URI
pub const TEST_REDIRECT_URI: &str = "http://localhost:9999/cb";
/// Issuer used by test engines
pub const TEST_ISSUER: &str = "http://localhost:8888";

static SIGNING_KEY: OnceLock<Arc<SigningKey>> = OnceLock::new();
static SECRET_HASH: OnceLock<String> = OnceLock::new();

/// Shared RS256 key (2048 bits for test speed)
pub fn shared_signing_key() -> Arc<SigningKey> {
    SIGNING_KEY
        .get_or_init(|| {
            Arc::new(SigningKey::generate_with_key_size("test-key", 2048).unwrap())
        })
        .clone()
}

/// Shared digest of [`TEST_CLIENT_SECRET`]
pub fn test_secret_hash() -> String {
    SECRET_HASH
        .get_or_init(|| password::hash(TEST_CLIENT_SECRET).unwrap())
        .clone()
}

/// A registered test client with the given scopes
pub fn test_client(scopes: &[&str]) -> Client {
    Client::new(
        TEST_CLIENT_ID.to_owned(),
        test_secret_hash(),
        vec![TEST_REDIRECT_URI.to_owned()],
        scopes.iter().map(|s| (*s).to_owned()).collect::<HashSet<_>>(),
    )
}

/// Everything a protocol test needs, wired over in-memory repositories
pub struct Harness {
    pub engine: Arc<AuthorizationServer>,
    pub store: Arc<GrantStore>,
    pub registry: Arc<ClientRegistry>,
    pub storage: Arc<InMemoryStorage>,
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserService>,
}

/// Harness with the full scope set and default lifetimes
pub fn harness() -> Harness {
    harness_with(
        &["openid", "profile", "email", "offline_access"],
        TokenLifetimes::default(),
    )
}

/// Harness with custom client scopes and lifetimes
pub fn harness_with(scopes: &[&str], lifetimes: TokenLifetimes) -> Harness {
    let storage = Arc::new(InMemoryStorage::new());
    let registry = Arc::new(ClientRegistry::with_clients([test_client(scopes)]));
    let store = Arc::new(GrantStore::new());
    let engine = Arc::new(AuthorizationServer::new(
        registry.clone(),
        store.clone(),
        shared_signing_key(),
        TEST_ISSUER,
        lifetimes,
    ));
    let sessions = Arc::new(SessionManager::new(storage.clone(), storage.clone()));
    let users = Arc::new(UserService::new(storage.clone(), storage.clone()));
    Harness {
        engine,
        store,
        registry,
        storage,
        sessions,
        users,
    }
}

/// Register a user through the normal path
pub async fn seed_user(harness: &Harness, username: &str, email: &str, pwd: &str) -> User {
    harness.users.register(username, email, pwd).await.unwrap()
}

/// A standard authorize request for the test client
pub fn authorize_request(scope: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: TEST_CLIENT_ID.to_owned(),
        redirect_uri: TEST_REDIRECT_URI.to_owned(),
        scope: Some(scope.to_owned()),
        state: Some("xyz-state".to_owned()),
        code_challenge: None,
        code_challenge_method: None,
        nonce: None,
    }
}

/// A token request redeeming the given code
pub fn code_token_request(code: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".to_owned(),
        code: Some(code.to_owned()),
        redirect_uri: Some(TEST_REDIRECT_URI.to_owned()),
        client_id: TEST_CLIENT_ID.to_owned(),
        client_secret: Some(TEST_CLIENT_SECRET.to_owned()),
        refresh_token: None,
        scope: None,
        code_verifier: None,
        client_assertion: None,
        client_assertion_type: None,
    }
}

/// A token request redeeming the given refresh token
pub fn refresh_token_request(refresh_token: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "refresh_token".to_owned(),
        code: None,
        redirect_uri: None,
        client_id: TEST_CLIENT_ID.to_owned(),
        client_secret: Some(TEST_CLIENT_SECRET.to_owned()),
        refresh_token: Some(refresh_token.to_owned()),
        scope: None,
        code_verifier: None,
        client_assertion: None,
        client_assertion_type: None,
    }
}

/// Drive authorize for an authenticated user and return the issued code
pub fn issue_code(harness: &Harness, user: &User, scope: &str) -> String {
    use gatehouse::oidc::AuthorizeOutcome;

    match harness
        .engine
        .authorize(&authorize_request(scope), Some(user))
        .unwrap()
    {
        AuthorizeOutcome::Redirect { code, .. } => code,
        AuthorizeOutcome::NeedsLogin => panic!("expected a code, got NeedsLogin"),
    }
}
