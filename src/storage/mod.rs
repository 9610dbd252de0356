// ABOUTME: Repository traits for users, sessions, and IdP connectors
// ABOUTME: Thin persistence capability - create/lookup/delete by key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Repositories
//!
//! The core never touches a database directly; it talks to these three
//! capabilities. Two implementations ship: an in-memory one
//! ([`memory::InMemoryStorage`]) for tests and development, and a SQLite one
//! ([`sqlite::SqliteStorage`]) for single-node deployments.

/// In-memory repository implementations
pub mod memory;
/// SQLite repository implementations
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{IdPConnector, LocalSession, User};

/// Repository-level error
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint was violated
    #[error("conflict: {context}")]
    Conflict {
        /// What collided
        context: String,
    },
    /// The underlying query failed
    #[error("query failed: {context}")]
    Query {
        /// What failed
        context: String,
    },
}

/// Persistence operations for users
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user. Fails with [`RepositoryError::Conflict`] when the
    /// username is taken.
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;
    /// Look up a user by id
    async fn by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    /// Look up a user by username
    async fn by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    /// Look up a user by email
    async fn by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Delete a user. Idempotent: deleting an absent user succeeds.
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

/// Persistence operations for local login sessions
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session
    async fn create(&self, session: &LocalSession) -> Result<(), RepositoryError>;
    /// Look up a session by its opaque token
    async fn by_token(&self, token: &str) -> Result<Option<LocalSession>, RepositoryError>;
    /// Delete every session belonging to a user. Idempotent.
    async fn delete_for_user(&self, user_id: Uuid) -> Result<(), RepositoryError>;
}

/// Persistence operations for upstream IdP connectors
#[async_trait]
pub trait ConnectorRepository: Send + Sync {
    /// Add or replace a connector (static provisioning)
    async fn put(&self, connector: &IdPConnector) -> Result<(), RepositoryError>;
    /// Look up a connector by id
    async fn by_id(&self, id: &str) -> Result<Option<IdPConnector>, RepositoryError>;
    /// List all configured connectors
    async fn list(&self) -> Result<Vec<IdPConnector>, RepositoryError>;
}
