// ABOUTME: Integration tests for the authorize/token/introspect state machine
// ABOUTME: Happy path, replay cascade, refresh rotation, PKCE, and scope policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use common::{
    authorize_request, code_token_request, harness, harness_with, issue_code,
    refresh_token_request, seed_user, shared_signing_key, TEST_CLIENT_ID, TEST_REDIRECT_URI,
};
use gatehouse::oidc::{AuthorizeOutcome, DiscoveryDocument, TokenLifetimes};
use sha2::{Digest, Sha256};

#[tokio::test]
async fn authorize_then_token_yields_contained_scopes() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let request = authorize_request("openid email");
    let outcome = h.engine.authorize(&request, Some(&user)).unwrap();
    let (code, state) = match outcome {
        AuthorizeOutcome::Redirect {
            redirect_uri,
            code,
            state,
        } => {
            assert_eq!(redirect_uri, TEST_REDIRECT_URI);
            (code, state)
        }
        AuthorizeOutcome::NeedsLogin => panic!("session was present"),
    };
    assert_eq!(state.as_deref(), Some("xyz-state"));

    let response = h.engine.token(&code_token_request(&code)).unwrap();
    assert_eq!(response.token_type, "bearer");
    assert_eq!(response.expires_in, 1800);
    // No offline_access requested: no refresh token
    assert!(response.refresh_token.is_none());
    assert!(response.id_token.is_some());

    let claims = h.engine.introspect(&response.access_token).unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.client_id, TEST_CLIENT_ID);
    assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
    // profile was not requested, so no username claim is released
    assert!(claims.preferred_username.is_none());
    let granted: Vec<&str> = claims.scope.split(' ').collect();
    assert!(granted.iter().all(|s| ["openid", "email"].contains(s)));
}

#[tokio::test]
async fn missing_session_requires_login() {
    let h = harness();
    let outcome = h
        .engine
        .authorize(&authorize_request("openid"), None)
        .unwrap();
    assert_eq!(outcome, AuthorizeOutcome::NeedsLogin);
}

#[tokio::test]
async fn unregistered_redirect_uri_is_rejected_before_issuance() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let mut request = authorize_request("openid");
    request.redirect_uri = "http://evil.example/cb".to_owned();
    let err = h.engine.authorize(&request, Some(&user)).unwrap_err();
    assert_eq!(err.error, "invalid_request");
}

#[tokio::test]
async fn scope_overreach_is_rejected() {
    // Client registered with {openid, profile} only
    let h = harness_with(&["openid", "profile"], TokenLifetimes::default());
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let err = h
        .engine
        .authorize(&authorize_request("openid admin"), Some(&user))
        .unwrap_err();
    assert_eq!(err.error, "invalid_scope");
}

#[tokio::test]
async fn code_replay_fails_and_revokes_issued_tokens() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let code = issue_code(&h, &user, "openid offline_access");
    let first = h.engine.token(&code_token_request(&code)).unwrap();
    assert!(h.engine.introspect(&first.access_token).is_some());

    // Second redemption is replay: rejected, and the first grant's tokens die
    let err = h.engine.token(&code_token_request(&code)).unwrap_err();
    assert_eq!(err.error, "invalid_grant");
    assert!(h.engine.introspect(&first.access_token).is_none());
    let refresh = first.refresh_token.unwrap();
    let err = h.engine.token(&refresh_token_request(&refresh)).unwrap_err();
    assert_eq!(err.error, "invalid_grant");
}

#[tokio::test]
async fn refresh_rotation_invalidates_the_prior_pair() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let code = issue_code(&h, &user, "openid offline_access");
    let first = h.engine.token(&code_token_request(&code)).unwrap();
    let first_refresh = first.refresh_token.clone().unwrap();

    // First rotation: old access token dies here
    let second = h
        .engine
        .token(&refresh_token_request(&first_refresh))
        .unwrap();
    assert!(h.engine.introspect(&first.access_token).is_none());
    assert!(h.engine.introspect(&second.access_token).is_some());
    assert!(second.refresh_token.is_some());

    // Second redemption of the rotated token fails as replay
    let err = h
        .engine
        .token(&refresh_token_request(&first_refresh))
        .unwrap_err();
    assert_eq!(err.error, "invalid_grant");
}

#[tokio::test]
async fn refresh_scope_may_only_narrow() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let code = issue_code(&h, &user, "openid email offline_access");
    let first = h.engine.token(&code_token_request(&code)).unwrap();
    let refresh = first.refresh_token.unwrap();

    let mut widen = refresh_token_request(&refresh);
    widen.scope = Some("openid profile".to_owned());
    let err = h.engine.token(&widen).unwrap_err();
    assert_eq!(err.error, "invalid_scope");

    // The failed widening did not consume the token; narrowing works
    let mut narrow = refresh_token_request(&refresh);
    narrow.scope = Some("openid offline_access".to_owned());
    let response = h.engine.token(&narrow).unwrap();
    let claims = h.engine.introspect(&response.access_token).unwrap();
    assert!(!claims.scope.contains("email"));
}

#[tokio::test]
async fn pkce_verifier_is_required_and_checked() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let verifier = "a".repeat(43);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

    let mut request = authorize_request("openid");
    request.code_challenge = Some(challenge.clone());
    request.code_challenge_method = Some("S256".to_owned());
    let code = match h.engine.authorize(&request, Some(&user)).unwrap() {
        AuthorizeOutcome::Redirect { code, .. } => code,
        AuthorizeOutcome::NeedsLogin => panic!("session was present"),
    };

    // Missing verifier burns the code
    let err = h.engine.token(&code_token_request(&code)).unwrap_err();
    assert_eq!(err.error, "invalid_grant");

    // A correct retry after the failure cannot resurrect it
    let mut retry = code_token_request(&code);
    retry.code_verifier = Some(verifier.clone());
    let err = h.engine.token(&retry).unwrap_err();
    assert_eq!(err.error, "invalid_grant");

    // Fresh code with the right verifier succeeds
    let code = match h.engine.authorize(&request, Some(&user)).unwrap() {
        AuthorizeOutcome::Redirect { code, .. } => code,
        AuthorizeOutcome::NeedsLogin => panic!("session was present"),
    };
    let mut ok = code_token_request(&code);
    ok.code_verifier = Some(verifier);
    assert!(h.engine.token(&ok).is_ok());
}

#[tokio::test]
async fn plain_pkce_method_is_rejected_at_authorize() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let mut request = authorize_request("openid");
    request.code_challenge = Some("c".repeat(43));
    request.code_challenge_method = Some("plain".to_owned());
    let err = h.engine.authorize(&request, Some(&user)).unwrap_err();
    assert_eq!(err.error, "invalid_request");
}

#[tokio::test]
async fn id_token_carries_issuer_subject_audience_and_nonce() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let mut request = authorize_request("openid profile");
    request.nonce = Some("n-0S6_WzA2Mj".to_owned());
    let code = match h.engine.authorize(&request, Some(&user)).unwrap() {
        AuthorizeOutcome::Redirect { code, .. } => code,
        AuthorizeOutcome::NeedsLogin => panic!("session was present"),
    };
    let response = h.engine.token(&code_token_request(&code)).unwrap();
    let id_token = response.id_token.unwrap();

    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.set_audience(&[TEST_CLIENT_ID]);
    let data = jsonwebtoken::decode::<gatehouse::oidc::tokens::IdTokenClaims>(
        &id_token,
        shared_signing_key().decoding_key(),
        &validation,
    )
    .unwrap();

    assert_eq!(data.claims.iss, common::TEST_ISSUER);
    assert_eq!(data.claims.sub, user.id.to_string());
    assert_eq!(data.claims.aud, TEST_CLIENT_ID);
    assert_eq!(data.claims.nonce.as_deref(), Some("n-0S6_WzA2Mj"));
    assert_eq!(data.claims.preferred_username.as_deref(), Some("alice"));
    assert!(data.claims.exp > data.claims.iat);
}

#[tokio::test]
async fn client_authentication_failures_are_invalid_client() {
    let h = harness();
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;
    let code = issue_code(&h, &user, "openid");

    let mut wrong_secret = code_token_request(&code);
    wrong_secret.client_secret = Some("not-the-secret".to_owned());
    assert_eq!(
        h.engine.token(&wrong_secret).unwrap_err().error,
        "invalid_client"
    );

    let mut unknown = code_token_request(&code);
    unknown.client_id = "nobody".to_owned();
    assert_eq!(
        h.engine.token(&unknown).unwrap_err().error,
        "invalid_client"
    );

    let mut missing = code_token_request(&code);
    missing.client_secret = None;
    assert_eq!(
        h.engine.token(&missing).unwrap_err().error,
        "invalid_client"
    );
}

#[tokio::test]
async fn unsupported_grant_types_are_rejected() {
    let h = harness();
    let mut request = code_token_request("whatever");
    request.grant_type = "client_credentials".to_owned();
    assert_eq!(
        h.engine.token(&request).unwrap_err().error,
        "unsupported_grant_type"
    );
}

#[tokio::test]
async fn expired_access_tokens_introspect_as_invalid() {
    let lifetimes = TokenLifetimes {
        access_token: Duration::seconds(-1),
        ..TokenLifetimes::default()
    };
    let h = harness_with(&["openid", "profile", "email", "offline_access"], lifetimes);
    let user = seed_user(&h, "alice", "alice@example.com", "correct-horse").await;

    let code = issue_code(&h, &user, "openid");
    let response = h.engine.token(&code_token_request(&code)).unwrap();
    assert!(h.engine.introspect(&response.access_token).is_none());
}

#[tokio::test]
async fn client_assertions_are_replay_checked_then_fail_closed() {
    let h = harness();

    let claims = serde_json::json!({
        "iss": TEST_CLIENT_ID,
        "sub": TEST_CLIENT_ID,
        "jti": "assert-1",
        "exp": (chrono::Utc::now() + Duration::minutes(5)).timestamp(),
    });
    let assertion = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"irrelevant"),
    )
    .unwrap();

    let mut request = code_token_request("irrelevant");
    request.client_secret = None;
    request.client_assertion = Some(assertion);
    request.client_assertion_type =
        Some("urn:ietf:params:oauth:client-assertion-type:jwt-bearer".to_owned());

    // First presentation: no assertion keys registered, so invalid_client
    assert_eq!(
        h.engine.token(&request).unwrap_err().error,
        "invalid_client"
    );
    // Second presentation of the same jti: replay
    assert_eq!(h.engine.token(&request).unwrap_err().error, "invalid_grant");
}

#[test]
fn discovery_endpoints_have_no_double_slashes() {
    let doc = DiscoveryDocument::for_issuer("http://host:8888/");
    assert_eq!(doc.authorization_endpoint, "http://host:8888/authorize");
    assert_eq!(doc.token_endpoint, "http://host:8888/token");
    assert_eq!(doc.userinfo_endpoint, "http://host:8888/userinfo");
    assert!(doc.scopes_supported.contains(&"offline_access".to_owned()));
    assert_eq!(doc.subject_types_supported, vec!["public".to_owned()]);
}
