// ABOUTME: End-to-end tests over the HTTP boundary
// ABOUTME: Register, login, authorize redirect, token exchange, and userinfo
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use common::{harness, Harness, TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_REDIRECT_URI};
use gatehouse::federation::{FederationService, OidcUpstreamClient};
use gatehouse::routes::{router, AppState};
use http::{header, Request, StatusCode};
use tower::util::ServiceExt;
use url::Url;

fn app(h: &Harness) -> Router {
    let upstream = Arc::new(OidcUpstreamClient::new(Duration::from_secs(1)).unwrap());
    let federation = Arc::new(FederationService::new(
        h.storage.clone(),
        upstream,
        h.storage.clone(),
        h.sessions.clone(),
        common::TEST_ISSUER,
    ));
    router(AppState {
        engine: h.engine.clone(),
        sessions: h.sessions.clone(),
        users: h.users.clone(),
        federation,
        signing_key: common::shared_signing_key(),
        issuer: common::TEST_ISSUER.to_owned(),
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn form_encode(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

#[tokio::test]
async fn discovery_and_health_respond() {
    let h = harness();
    let app = app(&h);

    let response = app
        .clone()
        .oneshot(
            Request::get("/.well-known/openid-configuration")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert_eq!(
        doc["authorization_endpoint"],
        format!("{}/authorize", common::TEST_ISSUER)
    );

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn jwks_serves_the_signing_key() {
    let h = harness();
    let response = app(&h)
        .oneshot(Request::get("/jwks.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let jwks = body_json(response).await;
    assert_eq!(jwks["keys"][0]["kty"], "RSA");
    assert_eq!(jwks["keys"][0]["alg"], "RS256");
}

#[tokio::test]
async fn full_code_flow_over_http() {
    let h = harness();
    let app = app(&h);

    // Register
    let response = app
        .clone()
        .oneshot(
            Request::post("/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "alice",
                        "email": "alice@example.com",
                        "password": "correct-horse",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Unauthenticated authorize redirects to the login surface
    let authorize_uri = format!(
        "/authorize?response_type=code&client_id={TEST_CLIENT_ID}&redirect_uri={}&scope=openid%20email&state=abc",
        urlencoded(TEST_REDIRECT_URI)
    );
    let response = app
        .clone()
        .oneshot(Request::get(authorize_uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    let loc = location(&response);
    assert!(loc.starts_with("/login?"));
    assert!(loc.contains("client_id=demo"));

    // Login with the echoed parameters establishes a session and bounces
    // back into authorize
    let response = app
        .clone()
        .oneshot(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_encode(&[
                    ("username", "alice"),
                    ("password", "correct-horse"),
                    ("client_id", TEST_CLIENT_ID),
                    ("redirect_uri", TEST_REDIRECT_URI),
                    ("response_type", "code"),
                    ("scope", "openid email"),
                    ("state", "abc"),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_owned();
    assert!(cookie.starts_with("gatehouse_session="));

    // Authorize with the session cookie issues a code
    let response = app
        .clone()
        .oneshot(
            Request::get(authorize_uri.as_str())
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    let callback = Url::parse(&location(&response)).unwrap();
    assert!(callback.as_str().starts_with(TEST_REDIRECT_URI));
    let code = query_param(&callback, "code").unwrap();
    assert_eq!(query_param(&callback, "state").as_deref(), Some("abc"));

    // Redeem the code
    let response = app
        .clone()
        .oneshot(
            Request::post("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_encode(&[
                    ("grant_type", "authorization_code"),
                    ("code", &code),
                    ("redirect_uri", TEST_REDIRECT_URI),
                    ("client_id", TEST_CLIENT_ID),
                    ("client_secret", TEST_CLIENT_SECRET),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = body_json(response).await;
    assert_eq!(tokens["token_type"], "bearer");
    let access_token = tokens["access_token"].as_str().unwrap().to_owned();
    assert!(tokens["id_token"].as_str().is_some());

    // Userinfo with the bearer token
    let response = app
        .clone()
        .oneshot(
            Request::get("/userinfo")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let claims = body_json(response).await;
    assert_eq!(claims["email"], "alice@example.com");
    assert!(claims["sub"].as_str().is_some());

    // Garbage bearer tokens get a 401
    let response = app
        .oneshot(
            Request::get("/userinfo")
                .header(header::AUTHORIZATION, "Bearer garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_endpoint_rejects_bad_client_credentials_with_401() {
    let h = harness();
    let response = app(&h)
        .oneshot(
            Request::post("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form_encode(&[
                    ("grant_type", "authorization_code"),
                    ("code", "whatever"),
                    ("redirect_uri", TEST_REDIRECT_URI),
                    ("client_id", TEST_CLIENT_ID),
                    ("client_secret", "wrong"),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn account_deletion_requires_and_consumes_the_session() {
    let h = harness();
    let app = app(&h);
    let user = common::seed_user(&h, "alice", "alice@example.com", "correct-horse").await;
    let session = h.sessions.create_session(user.id).await.unwrap();
    let cookie = format!("gatehouse_session={}", session.token);

    let response = app
        .clone()
        .oneshot(
            Request::delete("/account")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::delete("/account")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The cascade took the session with it
    let response = app
        .oneshot(
            Request::delete("/account")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned()
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn urlencoded(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
