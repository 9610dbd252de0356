// ABOUTME: OAuth2/OIDC request, response, and snapshot data models
// ABOUTME: Typed outcomes for the protocol engine plus RFC 6749 error shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth 2.0 authorization request, transient for one authorize call
#[derive(Debug, Deserialize, Clone)]
pub struct AuthorizeRequest {
    /// Response type (only `code` is supported)
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI; must be an exact member of the client's registered set
    pub redirect_uri: String,
    /// Requested scopes, space separated
    pub scope: Option<String>,
    /// State parameter echoed back to the client
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method; only `S256` is accepted
    pub code_challenge_method: Option<String>,
    /// OIDC nonce, bound into the ID token when `openid` is granted
    pub nonce: Option<String>,
}

impl AuthorizeRequest {
    /// Requested scopes as a list
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Outcome of an authorize call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// No authenticated subject; the caller must obtain a session (local
    /// login or federation) and re-invoke with the same parameters.
    NeedsLogin,
    /// Code issued; redirect the user agent back to the relying party.
    Redirect {
        /// The client's redirect URI, exactly as registered
        redirect_uri: String,
        /// The opaque authorization code
        code: String,
        /// State from the request, echoed unchanged
        state: Option<String>,
    },
}

/// OAuth 2.0 token request (form body of the token endpoint)
#[derive(Debug, Deserialize, Clone)]
pub struct TokenRequest {
    /// Grant type: `authorization_code` or `refresh_token`
    pub grant_type: String,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI; must match the one bound at authorize time
    pub redirect_uri: Option<String>,
    /// Client id
    pub client_id: String,
    /// Client secret (client_secret_post)
    pub client_secret: Option<String>,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
    /// Narrowed scope for refresh; must be a subset of the original grant
    pub scope: Option<String>,
    /// PKCE code verifier (RFC 7636)
    pub code_verifier: Option<String>,
    /// Signed client assertion (RFC 7523); replay-checked, then rejected
    /// because no client registers assertion keys
    pub client_assertion: Option<String>,
    /// Client assertion type URN
    pub client_assertion_type: Option<String>,
}

/// OAuth 2.0 token response
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// Opaque access token
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Granted scopes, space separated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Opaque refresh token, present when `offline_access` was granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Signed ID token, present when `openid` was granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// OAuth 2.0 error response (RFC 6749 §5.2)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable description, safe for the wire
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuth2Error {
    fn new(error: &str, description: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", description)
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new("invalid_client", "Client authentication failed")
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", description)
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self::new("invalid_scope", description)
    }

    /// Create an `unauthorized_client` error
    #[must_use]
    pub fn unauthorized_client(description: &str) -> Self {
        Self::new("unauthorized_client", description)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new("unsupported_grant_type", "Grant type not supported")
    }

    /// Create a `server_error` error with a sanitized message
    #[must_use]
    pub fn server_error() -> Self {
        Self::new("server_error", "Internal error")
    }
}

/// Enumerated optional identity claims carried by a grant. Strictly typed:
/// there is no open-ended claim map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileClaims {
    /// Email address, released under the `email` scope
    pub email: Option<String>,
    /// Preferred username, released under the `profile` scope
    pub preferred_username: Option<String>,
}

/// Immutable value snapshot of the originating authorization request, stored
/// inside every grant record. Decoupled from any live request object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestSnapshot {
    /// Links sibling tokens minted from the same grant for cascade revocation
    pub request_id: String,
    /// Client the grant was issued to
    pub client_id: String,
    /// Authenticated subject (user id)
    pub subject: String,
    /// Subject's username at issuance
    pub username: String,
    /// Redirect URI bound at authorize time
    pub redirect_uri: String,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// OIDC nonce, if the request carried one
    pub nonce: Option<String>,
    /// Typed optional claims released to this grant
    pub profile: ProfileClaims,
    /// When the grant was made
    pub issued_at: DateTime<Utc>,
}

impl RequestSnapshot {
    /// Create a snapshot with a fresh request id
    #[must_use]
    pub fn new(
        client_id: String,
        subject: String,
        username: String,
        redirect_uri: String,
        scopes: Vec<String>,
        nonce: Option<String>,
        profile: ProfileClaims,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            client_id,
            subject,
            username,
            redirect_uri,
            scopes,
            nonce,
            profile,
            issued_at: Utc::now(),
        }
    }

    /// Whether the grant includes the given scope
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Copy of this snapshot with a narrowed scope set
    #[must_use]
    pub fn with_scopes(&self, scopes: Vec<String>) -> Self {
        Self {
            scopes,
            ..self.clone()
        }
    }
}

/// Claims returned by token introspection, feeding the userinfo surface
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IntrospectionClaims {
    /// Subject (user id)
    pub sub: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Preferred username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// Email, when the `email` scope was granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Granted scopes, space separated
    pub scope: String,
    /// Expiry timestamp
    pub exp: i64,
}
