// ABOUTME: HTTP boundary - axum handlers translating typed outcomes to transport
// ABOUTME: Discovery, authorize, token, userinfo, jwks, login, federation, accounts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # HTTP Routes
//!
//! The only module that knows about HTTP. Engine and services return typed
//! outcomes; this layer maps them to status codes, redirects, and JSON
//! bodies, and owns the session cookie.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use http::{header, HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::auth::{is_credential_failure, SessionManager};
use crate::crypto::keys::SigningKey;
use crate::errors::{AppError, ErrorCode};
use crate::federation::FederationService;
use crate::models::User;
use crate::oidc::{
    AuthorizationServer, AuthorizeOutcome, AuthorizeRequest, DiscoveryDocument, OAuth2Error,
    TokenRequest,
};
use crate::users::UserService;

const SESSION_COOKIE: &str = "gatehouse_session";
const SESSION_COOKIE_MAX_AGE: i64 = 86_400;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// The protocol engine
    pub engine: Arc<AuthorizationServer>,
    /// Local session manager
    pub sessions: Arc<SessionManager>,
    /// User account service
    pub users: Arc<UserService>,
    /// Federation resolver
    pub federation: Arc<FederationService>,
    /// Active RS256 signing key (public half served as JWKS)
    pub signing_key: Arc<SigningKey>,
    /// This provider's issuer URL
    pub issuer: String,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/jwks.json", get(jwks))
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/userinfo", get(userinfo))
        .route("/register", post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
        .route("/account", delete(delete_account))
        .route("/federation", get(federation_list))
        .route("/auth/federation/:connector_id", get(federation_init))
        .route("/auth/callback/:connector_id", get(federation_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Session cookie plumbing ─────────────────────────────────────────────

fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_owned())
    })
}

fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_COOKIE_MAX_AGE}")
}

async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, Response> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    state
        .sessions
        .resolve_session(&token)
        .await
        .map_err(|e| app_error_response(&e))
}

// ── Error translation ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<String>,
}

fn app_error_response(err: &AppError) -> Response {
    if err.code.is_security_event() {
        tracing::warn!(%err, "security event at boundary");
    } else {
        tracing::debug!(%err, "request failed");
    }
    let error = match err.code {
        ErrorCode::Validation => "invalid_request",
        ErrorCode::NotFound | ErrorCode::Expired => "not_found",
        ErrorCode::Conflict => "conflict",
        ErrorCode::Replay => "invalid_grant",
        ErrorCode::Upstream => "federation_failed",
        ErrorCode::Internal => "server_error",
    };
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorBody {
        error,
        error_description: Some(err.public_message().to_owned()),
    };
    (status, Json(body)).into_response()
}

fn oauth_error_response(err: &OAuth2Error) -> Response {
    let status = if err.error == "invalid_client" {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(err.clone())).into_response()
}

// ── Discovery and keys ──────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn discovery(State(state): State<AppState>) -> Json<DiscoveryDocument> {
    Json(DiscoveryDocument::for_issuer(&state.issuer))
}

async fn jwks(State(state): State<AppState>) -> Response {
    Json(state.signing_key.jwks()).into_response()
}

// ── Authorize ───────────────────────────────────────────────────────────

/// Echoed application parameters, round-tripped through login and federation
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct EchoedParams {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    redirect_uri: String,
    #[serde(default)]
    response_type: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    state: String,
}

impl EchoedParams {
    fn from_authorize(request: &AuthorizeRequest) -> Self {
        Self {
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            response_type: request.response_type.clone(),
            scope: request.scope.clone().unwrap_or_default(),
            state: request.state.clone().unwrap_or_default(),
        }
    }

    fn authorize_url(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", &self.response_type)
            .append_pair("scope", &self.scope)
            .append_pair("state", &self.state);
        format!("/authorize?{}", query.finish())
    }

    fn login_url(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", &self.response_type)
            .append_pair("scope", &self.scope)
            .append_pair("state", &self.state);
        format!("/login?{}", query.finish())
    }
}

async fn authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(request): Query<AuthorizeRequest>,
) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.engine.authorize(&request, user.as_ref()) {
        Ok(AuthorizeOutcome::NeedsLogin) => {
            Redirect::to(&EchoedParams::from_authorize(&request).login_url()).into_response()
        }
        Ok(AuthorizeOutcome::Redirect {
            redirect_uri,
            code,
            state: client_state,
        }) => match Url::parse(&redirect_uri) {
            Ok(mut url) => {
                {
                    let mut query = url.query_pairs_mut();
                    query.append_pair("code", &code);
                    if let Some(value) = &client_state {
                        query.append_pair("state", value);
                    }
                }
                Redirect::to(url.as_str()).into_response()
            }
            Err(_) => oauth_error_response(&OAuth2Error::invalid_request("Invalid redirect_uri")),
        },
        Err(err) => oauth_error_response(&err),
    }
}

// ── Token and userinfo ──────────────────────────────────────────────────

async fn token(State(state): State<AppState>, Form(request): Form<TokenRequest>) -> Response {
    match state.engine.token(&request) {
        Ok(response) => Json(response).into_response(),
        Err(err) => oauth_error_response(&err),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn userinfo(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_token" })),
        )
            .into_response();
    };
    match state.engine.introspect(token) {
        Some(claims) => {
            let mut body = serde_json::Map::new();
            body.insert("sub".to_owned(), json!(claims.sub));
            if let Some(username) = claims.preferred_username {
                body.insert("preferred_username".to_owned(), json!(username));
            }
            if let Some(email) = claims.email {
                body.insert("email".to_owned(), json!(email));
            }
            Json(serde_json::Value::Object(body)).into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_token" })),
        )
            .into_response(),
    }
}

// ── Accounts and login ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    match state
        .users
        .register(&request.username, &request.email, &request.password)
        .await
    {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({
                "id": user.id,
                "username": user.username,
                "email": user.email,
            })),
        )
            .into_response(),
        Err(err) => app_error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    redirect_uri: String,
    #[serde(default)]
    response_type: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    state: String,
}

impl LoginForm {
    fn echoed(&self) -> EchoedParams {
        EchoedParams {
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            response_type: self.response_type.clone(),
            scope: self.scope.clone(),
            state: self.state.clone(),
        }
    }
}

/// The login surface. Rendering is a frontend concern; this returns the
/// fields a login page must post back, with the protocol parameters echoed.
async fn login_form(Query(params): Query<HashMap<String, String>>) -> Response {
    let get = |key: &str| params.get(key).cloned().unwrap_or_default();
    Json(json!({
        "action": "/login",
        "method": "POST",
        "fields": ["username", "password"],
        "params": {
            "client_id": get("client_id"),
            "redirect_uri": get("redirect_uri"),
            "response_type": get("response_type"),
            "scope": get("scope"),
            "state": get("state"),
        },
        "error": params.get("error"),
    }))
    .into_response()
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let user = match state.sessions.authenticate(&form.username, &form.password).await {
        Ok(user) => user,
        Err(err) if is_credential_failure(&err) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid_credentials" })),
            )
                .into_response();
        }
        Err(err) => return app_error_response(&err),
    };

    let session = match state.sessions.create_session(user.id).await {
        Ok(session) => session,
        Err(err) => return app_error_response(&err),
    };

    let cookie = session_cookie(&session.token);
    if form.client_id.is_empty() {
        (
            [(header::SET_COOKIE, cookie)],
            Json(json!({ "user_id": user.id })),
        )
            .into_response()
    } else {
        (
            [(header::SET_COOKIE, cookie)],
            Redirect::to(&form.echoed().authorize_url()),
        )
            .into_response()
    }
}

/// Logout everywhere: drops every session for the authenticated user and
/// clears the cookie
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(Some(user)) => user,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(response) => return response,
    };
    if let Err(err) = state.sessions.delete_sessions_for_user(user.id).await {
        return app_error_response(&err);
    }
    let expired = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    ([(header::SET_COOKIE, expired)], StatusCode::NO_CONTENT).into_response()
}

async fn delete_account(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid_session" })),
            )
                .into_response();
        }
        Err(response) => return response,
    };
    match state.users.delete(user.id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => app_error_response(&err),
    }
}

// ── Federation ──────────────────────────────────────────────────────────

async fn federation_list(State(state): State<AppState>) -> Response {
    match state.federation.list_connectors().await {
        Ok(connectors) => {
            let summaries: Vec<_> = connectors
                .iter()
                .map(|c| json!({ "id": c.id, "issuer": c.issuer }))
                .collect();
            Json(json!({ "connectors": summaries })).into_response()
        }
        Err(err) => app_error_response(&err),
    }
}

fn encode_state(params: &EchoedParams) -> Option<String> {
    serde_json::to_vec(params)
        .ok()
        .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
}

fn decode_state(blob: &str) -> Option<EchoedParams> {
    let bytes = URL_SAFE_NO_PAD.decode(blob).ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn federation_init(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let get = |key: &str| params.get(key).cloned().unwrap_or_default();
    let echoed = EchoedParams {
        client_id: get("client_id"),
        redirect_uri: get("redirect_uri"),
        response_type: get("response_type"),
        scope: get("scope"),
        state: get("state"),
    };
    let Some(blob) = encode_state(&echoed) else {
        return Redirect::to("/login?error=invalid_params").into_response();
    };

    match state.federation.authorize_url(&connector_id, &blob).await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(err) if err.code == ErrorCode::NotFound => {
            Redirect::to("/login?error=connector_not_found").into_response()
        }
        Err(err) => {
            tracing::warn!(%err, %connector_id, "federation init failed");
            Redirect::to("/login?error=federation_failed").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

async fn federation_callback(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if query.code.is_empty() || query.state.is_empty() {
        return Redirect::to("/login?error=invalid_callback_params").into_response();
    }
    let Some(echoed) = decode_state(&query.state) else {
        return Redirect::to("/login?error=invalid_state").into_response();
    };

    let redirect_uri = state.federation.callback_uri(&connector_id);
    let session = match state
        .federation
        .login_with_upstream(&connector_id, &query.code, &redirect_uri)
        .await
    {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(%err, %connector_id, "federation callback failed");
            return Redirect::to("/login?error=federation_failed").into_response();
        }
    };

    let cookie = session_cookie(&session.token);
    let target = if echoed.client_id.is_empty() && echoed.redirect_uri.is_empty() {
        "/login".to_owned()
    } else {
        echoed.authorize_url()
    };
    ([(header::SET_COOKIE, cookie)], Redirect::to(&target)).into_response()
}
