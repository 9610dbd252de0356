// ABOUTME: Core domain models for the identity provider
// ABOUTME: Defines User, LocalSession, and IdPConnector value types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Domain Models
//!
//! The persistent identities this provider manages: local users, their login
//! sessions, and the static configuration of federated upstream providers.
//! Protocol-level records (codes, tokens, snapshots) live in [`crate::oidc`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local user identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Unique login name
    pub username: String,
    /// Email address; identity-linking key for federation
    pub email: String,
    /// Password digest. A random placeholder for federation-only identities.
    pub password_hash: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id
    #[must_use]
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Lifetime of a local login session
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// An authenticated user session. The token is an opaque ≥256-bit random
/// value, distinct from any protocol token signature, and must be handled
/// with password-equivalent secrecy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalSession {
    /// Unique session identifier
    pub id: Uuid,
    /// User this session belongs to
    pub user_id: Uuid,
    /// Opaque session token (hex of 32 random bytes)
    pub token: String,
    /// When this session stops resolving
    pub expires_at: DateTime<Utc>,
}

impl LocalSession {
    /// Create a session for the given user with the standard lifetime
    #[must_use]
    pub fn new(user_id: Uuid, token: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at: Utc::now() + Duration::hours(SESSION_LIFETIME_HOURS),
        }
    }

    /// Whether this session is past its expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Static configuration for a federated upstream identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdPConnector {
    /// Connector identifier, used in callback paths
    pub id: String,
    /// Upstream issuer URL
    pub issuer: String,
    /// Client id registered with the upstream provider
    pub client_id: String,
    /// Client secret registered with the upstream provider
    pub client_secret: String,
}
