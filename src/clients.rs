// ABOUTME: Relying-party client registry with secret verification
// ABOUTME: Resolves client ids to registered metadata and enforces containment rules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Client Registry
//!
//! Single-tenant, statically provisioned set of relying parties. Every
//! protocol request is validated against the registered metadata: redirect
//! URIs are matched exactly, requested scopes and grant/response types must
//! be subsets of the registered sets. Registrations are immutable except for
//! admin secret rotation.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::crypto::password;
use crate::errors::{AppError, AppResult};

/// Grant types a client may use at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code grant
    AuthorizationCode,
    /// Refresh token grant
    RefreshToken,
}

impl GrantType {
    /// Wire name of this grant type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Response types a client may use at the authorize endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Authorization code response
    Code,
}

impl ResponseType {
    /// Wire name of this response type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
        }
    }
}

/// A registered relying party
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    /// Client identifier
    pub client_id: String,
    /// Digest of the client secret; the plaintext is never stored
    pub secret_hash: String,
    /// Exact redirect URIs this client may use
    pub redirect_uris: Vec<String>,
    /// Grant types this client may use
    pub grant_types: HashSet<GrantType>,
    /// Response types this client may use
    pub response_types: HashSet<ResponseType>,
    /// Scopes this client may request
    pub scopes: HashSet<String>,
}

impl Client {
    /// Create a client with the standard grant/response types
    #[must_use]
    pub fn new(
        client_id: String,
        secret_hash: String,
        redirect_uris: Vec<String>,
        scopes: HashSet<String>,
    ) -> Self {
        Self {
            client_id,
            secret_hash,
            redirect_uris,
            grant_types: HashSet::from([GrantType::AuthorizationCode, GrantType::RefreshToken]),
            response_types: HashSet::from([ResponseType::Code]),
            scopes,
        }
    }

    /// Exact membership test for a redirect URI
    #[must_use]
    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Whether every requested scope is registered for this client
    #[must_use]
    pub fn allows_scopes<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested.iter().all(|s| self.scopes.contains(s.as_ref()))
    }

    /// Whether the client may use the given grant type
    #[must_use]
    pub fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Whether the client may use the given response type
    #[must_use]
    pub fn allows_response_type(&self, response_type: ResponseType) -> bool {
        self.response_types.contains(&response_type)
    }
}

/// Registry of relying parties, keyed by client id
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Client>>,
}

impl ClientRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a static client set
    #[must_use]
    pub fn with_clients(clients: impl IntoIterator<Item = Client>) -> Self {
        let registry = Self::new();
        for client in clients {
            registry.insert(client);
        }
        registry
    }

    /// Add or replace a registration (provisioning, not dynamic registration)
    pub fn insert(&self, client: Client) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client.client_id.clone(), client);
    }

    /// Resolve a client id to its registered metadata
    ///
    /// # Errors
    /// `NotFound` when no client is registered under this id; the boundary
    /// presents this as `invalid_client`
    pub fn lookup(&self, client_id: &str) -> AppResult<Client> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(client_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("unknown client {client_id}")))
    }

    /// Resolve a client and verify its secret against the stored digest.
    /// Lookup failure and secret mismatch are indistinguishable to the
    /// caller; both surface as `invalid_client`.
    ///
    /// # Errors
    /// `NotFound` for unknown ids and failed secret verification
    pub fn authenticate(&self, client_id: &str, client_secret: &str) -> AppResult<Client> {
        let client = self.lookup(client_id)?;
        if !password::verify(client_secret, &client.secret_hash) {
            tracing::warn!(client_id, "client secret verification failed");
            return Err(AppError::not_found("client authentication failed"));
        }
        Ok(client)
    }

    /// Admin rotation of a client secret; the only mutation registrations
    /// support after provisioning
    ///
    /// # Errors
    /// `NotFound` when no client is registered under this id
    pub fn rotate_secret(&self, client_id: &str, new_secret_hash: String) -> AppResult<()> {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        let client = clients
            .get_mut(client_id)
            .ok_or_else(|| AppError::not_found(format!("unknown client {client_id}")))?;
        client.secret_hash = new_secret_hash;
        tracing::info!(client_id, "client secret rotated");
        Ok(())
    }
}
