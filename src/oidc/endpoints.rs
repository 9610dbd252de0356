// ABOUTME: The authorize/token/introspect protocol state machine
// ABOUTME: Validates requests, issues and redeems grants, signs ID tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Protocol Engine
//!
//! Two entry points drive the authorize→code→token lifecycle, plus an
//! introspection surface for userinfo. All outcomes are typed; the HTTP
//! boundary translates them. Security invariants enforced here:
//!
//! - redirect URI exact-match is checked before any code is issued
//! - requested scopes must be a subset of the client's registered scopes
//!   (reject on overreach, never widen or silently narrow)
//! - codes are single-use; replay cascade-revokes the whole grant chain
//! - refresh tokens rotate on use; reuse of a rotated token is replay
//! - PKCE verification happens after code consumption, so a failed verifier
//!   still burns the code

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::models::{
    AuthorizeOutcome, AuthorizeRequest, IntrospectionClaims, OAuth2Error, ProfileClaims,
    RequestSnapshot, TokenRequest, TokenResponse,
};
use super::tokens::{mint_opaque_token, signature_of, IdTokenSigner};
use crate::clients::{Client, ClientRegistry, GrantType, ResponseType};
use crate::crypto::keys::SigningKey;
use crate::models::User;
use crate::store::{CodeLookup, GrantStore, PkceRecord, RefreshLookup, StoreError};

/// RFC 7523 client assertion type URN
const JWT_BEARER_ASSERTION: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Fixed per-deployment credential lifetimes
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    /// Authorization code redemption window
    pub authorization_code: Duration,
    /// Access token lifetime
    pub access_token: Duration,
    /// Refresh token lifetime
    pub refresh_token: Duration,
    /// ID token lifetime
    pub id_token: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            authorization_code: Duration::minutes(10),
            access_token: Duration::minutes(30),
            refresh_token: Duration::hours(24),
            id_token: Duration::hours(1),
        }
    }
}

/// Claims read from a signed client assertion for replay bookkeeping
#[derive(Debug, Deserialize)]
struct AssertionClaims {
    jti: Option<String>,
    exp: Option<i64>,
}

/// The OAuth2/OIDC authorization server
pub struct AuthorizationServer {
    registry: Arc<ClientRegistry>,
    store: Arc<GrantStore>,
    signer: IdTokenSigner,
    lifetimes: TokenLifetimes,
}

impl AuthorizationServer {
    /// Create a server over the given registry, store, and signing key
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry>,
        store: Arc<GrantStore>,
        signing_key: Arc<SigningKey>,
        issuer: &str,
        lifetimes: TokenLifetimes,
    ) -> Self {
        let issuer = issuer.trim_end_matches('/').to_owned();
        Self {
            registry,
            store,
            signer: IdTokenSigner::new(issuer, signing_key, lifetimes.id_token),
            lifetimes,
        }
    }

    /// Handle an authorization request.
    ///
    /// With no authenticated subject the outcome is
    /// [`AuthorizeOutcome::NeedsLogin`]; the caller authenticates the user
    /// (local credential or federation) and re-invokes. Otherwise a
    /// single-use code is minted, bound to subject, client, and granted
    /// scopes.
    ///
    /// # Errors
    /// Typed OAuth errors for unknown clients, redirect URI mismatches,
    /// unsupported response types, and scope overreach
    pub fn authorize(
        &self,
        request: &AuthorizeRequest,
        subject: Option<&User>,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let client = self.registry.lookup(&request.client_id).map_err(|e| {
            tracing::debug!(client_id = %request.client_id, %e, "client lookup failed");
            OAuth2Error::invalid_client()
        })?;

        // Exact-match the redirect URI before anything is issued; everything
        // after this point may redirect errors to it.
        if !client.allows_redirect_uri(&request.redirect_uri) {
            return Err(OAuth2Error::invalid_request("Invalid redirect_uri"));
        }

        if request.response_type != ResponseType::Code.as_str() {
            return Err(OAuth2Error::invalid_request(
                "Only 'code' response_type is supported",
            ));
        }
        if !client.allows_response_type(ResponseType::Code) {
            return Err(OAuth2Error::unauthorized_client(
                "Client is not registered for the 'code' response type",
            ));
        }
        if !client.allows_grant_type(GrantType::AuthorizationCode) {
            return Err(OAuth2Error::unauthorized_client(
                "Client is not registered for the authorization_code grant",
            ));
        }

        let requested_scopes = request.scopes();
        if !client.allows_scopes(&requested_scopes) {
            return Err(OAuth2Error::invalid_scope(
                "Requested scope exceeds the client's registered scopes",
            ));
        }

        Self::validate_pkce_challenge(request)?;

        let Some(user) = subject else {
            return Ok(AuthorizeOutcome::NeedsLogin);
        };

        let profile = Self::profile_claims(user, &requested_scopes);
        let snapshot = RequestSnapshot::new(
            client.client_id.clone(),
            user.id.to_string(),
            user.username.clone(),
            request.redirect_uri.clone(),
            requested_scopes,
            request.nonce.clone(),
            profile,
        );

        let code = mint_opaque_token();
        let expires_at = Utc::now() + self.lifetimes.authorization_code;
        self.store
            .put_authorization_code(&code.signature, snapshot.clone(), expires_at);

        if let Some(challenge) = &request.code_challenge {
            self.store.put_pkce(
                &code.signature,
                PkceRecord {
                    challenge: challenge.clone(),
                    method: "S256".to_owned(),
                },
            );
        }
        if snapshot.has_scope("openid") {
            self.store.put_continuation(&code.signature, snapshot);
        }

        tracing::debug!(client_id = %client.client_id, "authorization code issued");
        Ok(AuthorizeOutcome::Redirect {
            redirect_uri: request.redirect_uri.clone(),
            code: code.token,
            state: request.state.clone(),
        })
    }

    /// Handle a token request for the `authorization_code` or
    /// `refresh_token` grant.
    ///
    /// # Errors
    /// Typed OAuth errors; replayed codes and refresh tokens are rejected
    /// after cascade-revoking the grant chain
    pub fn token(&self, request: &TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let client = self.authenticate_client(request)?;

        match request.grant_type.as_str() {
            "authorization_code" => self.redeem_authorization_code(&client, request),
            "refresh_token" => self.redeem_refresh_token(&client, request),
            _ => Err(OAuth2Error::unsupported_grant_type()),
        }
    }

    /// Look up an access token and return its claims when live and
    /// unexpired. Feeds the userinfo surface. Expiry and absence are
    /// indistinguishable to the caller.
    #[must_use]
    pub fn introspect(&self, token: &str) -> Option<IntrospectionClaims> {
        let signature = signature_of(token);
        let record = match self.store.access_token(&signature) {
            Ok(record) => record,
            Err(_) => return None,
        };
        if record.expires_at <= Utc::now() {
            tracing::debug!("access token past expiry presented");
            return None;
        }
        let snapshot = record.snapshot;
        Some(IntrospectionClaims {
            sub: snapshot.subject.clone(),
            client_id: snapshot.client_id.clone(),
            preferred_username: snapshot.profile.preferred_username.clone(),
            email: snapshot.profile.email.clone(),
            scope: snapshot.scopes.join(" "),
            exp: record.expires_at.timestamp(),
        })
    }

    // ── Client authentication ───────────────────────────────────────────

    fn authenticate_client(&self, request: &TokenRequest) -> Result<Client, OAuth2Error> {
        if request.client_assertion.is_some() || request.client_assertion_type.is_some() {
            return self.authenticate_client_assertion(request);
        }
        let secret = request
            .client_secret
            .as_deref()
            .ok_or_else(OAuth2Error::invalid_client)?;
        self.registry
            .authenticate(&request.client_id, secret)
            .map_err(|e| {
                tracing::debug!(client_id = %request.client_id, %e, "client authentication failed");
                OAuth2Error::invalid_client()
            })
    }

    /// Replay-check a signed client assertion, then fail closed: no client
    /// registers assertion keys, so the credential can never verify. The
    /// jti is recorded first so a replayed assertion is flagged as a
    /// security event rather than a plain rejection.
    fn authenticate_client_assertion(&self, request: &TokenRequest) -> Result<Client, OAuth2Error> {
        if request.client_assertion_type.as_deref() != Some(JWT_BEARER_ASSERTION) {
            return Err(OAuth2Error::invalid_request(
                "Unsupported client_assertion_type",
            ));
        }
        let assertion = request
            .client_assertion
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing client_assertion"))?;

        let claims = Self::decode_assertion_claims(assertion)
            .ok_or_else(|| OAuth2Error::invalid_request("Malformed client_assertion"))?;

        if let (Some(jti), Some(exp)) = (claims.jti, claims.exp) {
            let expires_at = chrono::DateTime::from_timestamp(exp, 0)
                .ok_or_else(|| OAuth2Error::invalid_request("Malformed client_assertion exp"))?;
            if let Err(StoreError::AlreadyUsed) = self.store.mark_jti_used(&jti, expires_at) {
                tracing::warn!(
                    client_id = %request.client_id,
                    "replayed client assertion jti"
                );
                return Err(OAuth2Error::invalid_grant("Client assertion replayed"));
            }
        }

        tracing::debug!(
            client_id = %request.client_id,
            "client assertion presented but no assertion key is registered"
        );
        Err(OAuth2Error::invalid_client())
    }

    /// Read jti/exp from an assertion without verifying its signature; the
    /// claims are only used for replay bookkeeping, never trusted.
    fn decode_assertion_claims(assertion: &str) -> Option<AssertionClaims> {
        use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        decode::<AssertionClaims>(assertion, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .ok()
    }

    // ── Authorization code grant ────────────────────────────────────────

    fn redeem_authorization_code(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request
            .code
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing authorization code"))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri"))?;

        let signature = signature_of(code);
        let snapshot = match self.store.authorization_code(&signature) {
            Err(StoreError::NotFound | StoreError::AlreadyUsed) => {
                return Err(OAuth2Error::invalid_grant(
                    "Invalid or expired authorization code",
                ));
            }
            Ok(CodeLookup::Consumed { snapshot }) => {
                return Err(self.reject_code_replay(&snapshot));
            }
            Ok(CodeLookup::Active {
                snapshot,
                expires_at,
            }) => {
                if expires_at <= Utc::now() {
                    // Expired codes present like absent ones
                    tracing::debug!(client_id = %client.client_id, "expired authorization code presented");
                    self.store.delete_authorization_code(&signature);
                    self.store.take_pkce(&signature);
                    self.store.take_continuation(&signature);
                    return Err(OAuth2Error::invalid_grant(
                        "Invalid or expired authorization code",
                    ));
                }
                snapshot
            }
        };

        if snapshot.client_id != client.client_id {
            return Err(OAuth2Error::invalid_grant(
                "Authorization code was issued to a different client",
            ));
        }
        if snapshot.redirect_uri != redirect_uri {
            return Err(OAuth2Error::invalid_grant("redirect_uri mismatch"));
        }

        // Consume before PKCE verification: a failed verifier still burns
        // the code, and a concurrent redemption loses the race here.
        match self.store.consume_authorization_code(&signature) {
            Ok(()) => {}
            Err(StoreError::AlreadyUsed) => return Err(self.reject_code_replay(&snapshot)),
            Err(StoreError::NotFound) => {
                return Err(OAuth2Error::invalid_grant(
                    "Invalid or expired authorization code",
                ));
            }
        }

        self.verify_pkce(&signature, request.code_verifier.as_deref(), client)?;

        let continuation = self.store.take_continuation(&signature);
        self.mint_token_pair(&snapshot, continuation.is_some())
    }

    /// A consumed code was presented again: revoke everything minted from
    /// its grant before rejecting.
    fn reject_code_replay(&self, snapshot: &RequestSnapshot) -> OAuth2Error {
        tracing::warn!(
            client_id = %snapshot.client_id,
            request_id = %snapshot.request_id,
            "authorization code replay; revoking grant chain"
        );
        self.store.revoke_access_token(&snapshot.request_id);
        self.store.revoke_refresh_token(&snapshot.request_id);
        OAuth2Error::invalid_grant("Authorization code already used")
    }

    fn verify_pkce(
        &self,
        code_signature: &str,
        code_verifier: Option<&str>,
        client: &Client,
    ) -> Result<(), OAuth2Error> {
        let Some(record) = self.store.take_pkce(code_signature) else {
            if code_verifier.is_some() {
                return Err(OAuth2Error::invalid_grant(
                    "code_verifier provided but no code_challenge was issued",
                ));
            }
            return Ok(());
        };

        let verifier = code_verifier
            .ok_or_else(|| OAuth2Error::invalid_grant("code_verifier is required (PKCE)"))?;
        if verifier.len() < 43 || verifier.len() > 128 {
            return Err(OAuth2Error::invalid_grant(
                "code_verifier must be between 43 and 128 characters",
            ));
        }
        if !verifier
            .chars()
            .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~'))
        {
            return Err(OAuth2Error::invalid_grant(
                "code_verifier contains invalid characters",
            ));
        }

        let computed = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        if computed.as_bytes().ct_eq(record.challenge.as_bytes()).into() {
            Ok(())
        } else {
            tracing::warn!(client_id = %client.client_id, "PKCE verification failed");
            Err(OAuth2Error::invalid_grant("Invalid code_verifier"))
        }
    }

    // ── Refresh token grant ─────────────────────────────────────────────

    fn redeem_refresh_token(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        if !client.allows_grant_type(GrantType::RefreshToken) {
            return Err(OAuth2Error::unauthorized_client(
                "Client is not registered for the refresh_token grant",
            ));
        }
        let refresh_token = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;

        let signature = signature_of(refresh_token);
        let snapshot = match self.store.refresh_token(&signature) {
            Err(_) => {
                return Err(OAuth2Error::invalid_grant(
                    "Invalid or expired refresh token",
                ));
            }
            Ok(RefreshLookup::Revoked { snapshot }) => {
                // Reuse of a rotated token: the presenter may hold a stolen
                // credential, so the whole chain is revoked.
                tracing::warn!(
                    client_id = %snapshot.client_id,
                    request_id = %snapshot.request_id,
                    "rotated refresh token replayed; revoking grant chain"
                );
                self.store.revoke_access_token(&snapshot.request_id);
                self.store.revoke_refresh_token(&snapshot.request_id);
                return Err(OAuth2Error::invalid_grant("Refresh token already used"));
            }
            Ok(RefreshLookup::Active {
                snapshot,
                expires_at,
                ..
            }) => {
                if expires_at <= Utc::now() {
                    tracing::debug!(client_id = %client.client_id, "expired refresh token presented");
                    self.store.delete_refresh_token(&signature);
                    return Err(OAuth2Error::invalid_grant(
                        "Invalid or expired refresh token",
                    ));
                }
                snapshot
            }
        };

        if snapshot.client_id != client.client_id {
            return Err(OAuth2Error::invalid_grant(
                "Refresh token was issued to a different client",
            ));
        }

        // Scope may only shrink on refresh
        let granted = match &request.scope {
            None => snapshot.scopes.clone(),
            Some(scope) => {
                let narrowed: Vec<String> =
                    scope.split_whitespace().map(str::to_string).collect();
                if !narrowed.iter().all(|s| snapshot.has_scope(s)) {
                    return Err(OAuth2Error::invalid_scope(
                        "Requested scope exceeds the original grant",
                    ));
                }
                narrowed
            }
        };

        // Revoke the prior pair before minting replacements; the replay
        // window closes here, not after the response is written.
        self.store.rotate(&snapshot.request_id);

        let snapshot = snapshot.with_scopes(granted);
        self.mint_token_pair(&snapshot, snapshot.has_scope("openid"))
    }

    // ── Minting ─────────────────────────────────────────────────────────

    fn mint_token_pair(
        &self,
        snapshot: &RequestSnapshot,
        mint_id_token: bool,
    ) -> Result<TokenResponse, OAuth2Error> {
        let now = Utc::now();

        let access = mint_opaque_token();
        self.store.put_access_token(
            &access.signature,
            snapshot.clone(),
            now + self.lifetimes.access_token,
        );

        let refresh_token = if snapshot.has_scope("offline_access") {
            let refresh = mint_opaque_token();
            self.store.put_refresh_token(
                &refresh.signature,
                &access.signature,
                snapshot.clone(),
                now + self.lifetimes.refresh_token,
            );
            Some(refresh.token)
        } else {
            None
        };

        let id_token = if mint_id_token {
            let signed = self.signer.mint(snapshot).map_err(|e| {
                tracing::error!(
                    client_id = %snapshot.client_id,
                    "failed to sign id token: {e:#}"
                );
                OAuth2Error::server_error()
            })?;
            Some(signed)
        } else {
            None
        };

        Ok(TokenResponse {
            access_token: access.token,
            token_type: "bearer".to_owned(),
            expires_in: self.lifetimes.access_token.num_seconds(),
            scope: Some(snapshot.scopes.join(" ")),
            refresh_token,
            id_token,
        })
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn validate_pkce_challenge(request: &AuthorizeRequest) -> Result<(), OAuth2Error> {
        let Some(challenge) = &request.code_challenge else {
            return Ok(());
        };
        if challenge.len() < 43 || challenge.len() > 128 {
            return Err(OAuth2Error::invalid_request(
                "code_challenge must be between 43 and 128 characters",
            ));
        }
        let method = request.code_challenge_method.as_deref().unwrap_or("S256");
        if method != "S256" {
            return Err(OAuth2Error::invalid_request(
                "code_challenge_method must be 'S256'",
            ));
        }
        Ok(())
    }

    fn profile_claims(user: &User, scopes: &[String]) -> ProfileClaims {
        let has = |name: &str| scopes.iter().any(|s| s == name);
        ProfileClaims {
            email: has("email").then(|| user.email.clone()),
            preferred_username: has("profile").then(|| user.username.clone()),
        }
    }
}
