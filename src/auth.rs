// ABOUTME: Local credential verification and session management
// ABOUTME: Password login, opaque session tokens with expiry, logout cascade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Session Manager
//!
//! Validates local password credentials and issues opaque login sessions.
//! Session tokens are 32 bytes of OS randomness, hex encoded, stored through
//! the session repository, and must be handled with password-equivalent
//! secrecy. An expired or unknown token resolves to `None`, never an error.

use std::sync::Arc;

use rand::RngCore;
use uuid::Uuid;

use crate::crypto::password;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{LocalSession, User};
use crate::storage::{SessionRepository, UserRepository};

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues and resolves local login sessions
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl SessionManager {
    /// Create a session manager over the given repositories
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { users, sessions }
    }

    /// Check a username and password against the stored digest. Unknown
    /// usernames and wrong passwords are indistinguishable to the caller.
    ///
    /// # Errors
    /// `Validation` for bad credentials, `Internal` for repository failures
    pub async fn authenticate(&self, username: &str, plaintext: &str) -> AppResult<User> {
        let user = self
            .users
            .by_username(username)
            .await
            .map_err(|e| AppError::internal("user lookup failed").with_source(e))?;
        match user {
            Some(user) if password::verify(plaintext, &user.password_hash) => Ok(user),
            _ => {
                tracing::debug!(username, "credential verification failed");
                Err(AppError::validation("invalid username or password"))
            }
        }
    }

    /// Create a fresh session for the given user
    ///
    /// # Errors
    /// `Internal` when the session cannot be stored
    pub async fn create_session(&self, user_id: Uuid) -> AppResult<LocalSession> {
        let session = LocalSession::new(user_id, generate_session_token());
        self.sessions
            .create(&session)
            .await
            .map_err(|e| AppError::internal("store session failed").with_source(e))?;
        tracing::debug!(user_id = %user_id, "session created");
        Ok(session)
    }

    /// Resolve a session token to its user. Expired or unknown tokens
    /// resolve to `None`; expiry is logged distinctly but never surfaced.
    ///
    /// # Errors
    /// `Internal` for repository failures
    pub async fn resolve_session(&self, token: &str) -> AppResult<Option<User>> {
        let Some(session) = self
            .sessions
            .by_token(token)
            .await
            .map_err(|e| AppError::internal("session lookup failed").with_source(e))?
        else {
            return Ok(None);
        };
        if session.is_expired() {
            tracing::debug!(user_id = %session.user_id, "expired session presented");
            return Ok(None);
        }
        self.users
            .by_id(session.user_id)
            .await
            .map_err(|e| AppError::internal("user lookup failed").with_source(e))
    }

    /// Drop every session for a user (logout everywhere, account deletion)
    ///
    /// # Errors
    /// `Internal` for repository failures
    pub async fn delete_sessions_for_user(&self, user_id: Uuid) -> AppResult<()> {
        self.sessions
            .delete_for_user(user_id)
            .await
            .map_err(|e| AppError::internal("delete sessions failed").with_source(e))
    }
}

/// Whether an auth error is a credential failure (as opposed to an outage)
#[must_use]
pub fn is_credential_failure(err: &AppError) -> bool {
    err.code == ErrorCode::Validation
}
