// ABOUTME: Federation resolver - upstream login and local identity linking
// ABOUTME: Exchanges upstream codes, maps claims to a local user, creates the session
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Federation Resolver
//!
//! Delegates authentication to a configured upstream provider, then links or
//! mints a local identity from the returned claims. The state parameter is
//! an opaque blob to this module: CSRF binding is the caller's
//! responsibility, the resolver just passes it through.

/// Upstream OIDC exchange client and trait
pub mod upstream;

use std::sync::Arc;

use crate::auth::SessionManager;
use crate::crypto::password;
use crate::errors::{AppError, AppResult};
use crate::models::{IdPConnector, LocalSession, User};
use crate::storage::{ConnectorRepository, UserRepository};
use upstream::{UpstreamClaims, UpstreamExchange};

pub use upstream::OidcUpstreamClient;

/// Drives upstream IdP login and identity linking
pub struct FederationService {
    connectors: Arc<dyn ConnectorRepository>,
    exchange: Arc<dyn UpstreamExchange>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionManager>,
    issuer: String,
}

impl FederationService {
    /// Create a federation service. `issuer` is this provider's own issuer
    /// URL, used to derive callback addresses.
    #[must_use]
    pub fn new(
        connectors: Arc<dyn ConnectorRepository>,
        exchange: Arc<dyn UpstreamExchange>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<SessionManager>,
        issuer: &str,
    ) -> Self {
        Self {
            connectors,
            exchange,
            users,
            sessions,
            issuer: issuer.trim_end_matches('/').to_owned(),
        }
    }

    /// The callback address upstream providers redirect back to
    #[must_use]
    pub fn callback_uri(&self, connector_id: &str) -> String {
        format!("{}/auth/callback/{connector_id}", self.issuer)
    }

    /// All configured connectors
    ///
    /// # Errors
    /// `Internal` for repository failures
    pub async fn list_connectors(&self) -> AppResult<Vec<IdPConnector>> {
        self.connectors
            .list()
            .await
            .map_err(|e| AppError::internal("list connectors failed").with_source(e))
    }

    /// Build the upstream authorize URL for a connector. The state blob is
    /// passed through uninterpreted.
    ///
    /// # Errors
    /// `NotFound` for unknown connectors, `Upstream` for discovery failures
    pub async fn authorize_url(&self, connector_id: &str, state: &str) -> AppResult<String> {
        let connector = self.connector(connector_id).await?;
        self.exchange
            .authorize_url(&connector, &self.callback_uri(connector_id), state)
            .await
    }

    /// Complete an upstream login: exchange the code, retrieve claims,
    /// resolve or create the local user, and open a session for them.
    ///
    /// # Errors
    /// `NotFound` for unknown connectors, `Upstream` for exchange failures,
    /// `Internal` for repository failures
    pub async fn login_with_upstream(
        &self,
        connector_id: &str,
        code: &str,
        redirect_uri: &str,
    ) -> AppResult<LocalSession> {
        let connector = self.connector(connector_id).await?;
        let claims = self
            .exchange
            .exchange_and_claims(&connector, code, redirect_uri)
            .await?;
        let user = self.resolve_or_create_user(&claims).await?;
        tracing::info!(
            connector_id,
            user_id = %user.id,
            "federated login completed"
        );
        self.sessions.create_session(user.id).await
    }

    async fn connector(&self, connector_id: &str) -> AppResult<IdPConnector> {
        self.connectors
            .by_id(connector_id)
            .await
            .map_err(|e| AppError::internal("connector lookup failed").with_source(e))?
            .ok_or_else(|| AppError::not_found(format!("unknown connector {connector_id}")))
    }

    /// Link by email when a local user exists; otherwise mint one. The
    /// username preference order is preferred_username, then email, then the
    /// upstream subject. Federated accounts get a random placeholder digest
    /// so the password path can never match them.
    async fn resolve_or_create_user(&self, claims: &UpstreamClaims) -> AppResult<User> {
        if let Some(email) = claims.email.as_deref().filter(|e| !e.is_empty()) {
            let existing = self
                .users
                .by_email(email)
                .await
                .map_err(|e| AppError::internal("user lookup failed").with_source(e))?;
            if let Some(user) = existing {
                return Ok(user);
            }
        }

        let username = claims
            .preferred_username
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| claims.email.clone().filter(|e| !e.is_empty()))
            .unwrap_or_else(|| claims.sub.clone());
        let email = claims.email.clone().unwrap_or_default();

        let digest = password::random_placeholder()
            .map_err(|e| AppError::internal("placeholder digest failed").with_source(e))?;
        let user = User::new(username, email, digest);
        self.users
            .create(&user)
            .await
            .map_err(|e| AppError::internal("create federated user failed").with_source(e))?;
        tracing::info!(user_id = %user.id, "federated identity minted");
        Ok(user)
    }
}
