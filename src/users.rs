// ABOUTME: User account lifecycle - registration and idempotent deletion
// ABOUTME: Enforces username uniqueness and minimum password strength
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

use std::sync::Arc;

use uuid::Uuid;

use crate::crypto::password;
use crate::errors::{AppError, AppResult};
use crate::models::User;
use crate::storage::{RepositoryError, SessionRepository, UserRepository};

const MIN_PASSWORD_LEN: usize = 8;

/// User account operations
pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl UserService {
    /// Create a user service over the given repositories
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { users, sessions }
    }

    /// Register a new local user
    ///
    /// # Errors
    /// `Conflict` when the username is taken, `Validation` when the password
    /// is too weak, `Internal` for repository or digest failures
    pub async fn register(&self, username: &str, email: &str, plaintext: &str) -> AppResult<User> {
        if plaintext.len() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                "password does not meet strength requirements",
            ));
        }
        let existing = self
            .users
            .by_username(username)
            .await
            .map_err(|e| AppError::internal("username lookup failed").with_source(e))?;
        if existing.is_some() {
            return Err(AppError::conflict("username already taken"));
        }

        let digest = password::hash(plaintext)
            .map_err(|e| AppError::internal("hash password failed").with_source(e))?;
        let user = User::new(username.to_owned(), email.to_owned(), digest);
        match self.users.create(&user).await {
            Ok(()) => {
                tracing::info!(username, "user registered");
                Ok(user)
            }
            // Lost a race with a concurrent registration of the same name
            Err(RepositoryError::Conflict { .. }) => {
                Err(AppError::conflict("username already taken"))
            }
            Err(e) => Err(AppError::internal("create user failed").with_source(e)),
        }
    }

    /// Delete a user and all of their sessions. Idempotent: deleting an
    /// absent user succeeds.
    ///
    /// # Errors
    /// `Internal` for repository failures
    pub async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        self.sessions
            .delete_for_user(user_id)
            .await
            .map_err(|e| AppError::internal("delete sessions failed").with_source(e))?;
        self.users
            .delete(user_id)
            .await
            .map_err(|e| AppError::internal("delete user failed").with_source(e))?;
        tracing::info!(user_id = %user_id, "user deleted");
        Ok(())
    }
}
