// ABOUTME: In-memory repository implementations over tokio-synchronized maps
// ABOUTME: Used by tests and development mode; enforces the same uniqueness rules as SQLite
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConnectorRepository, RepositoryError, SessionRepository, UserRepository};
use crate::models::{IdPConnector, LocalSession, User};

/// In-memory users, sessions, and connectors behind async locks.
/// One instance implements all three repository capabilities.
#[derive(Default)]
pub struct InMemoryStorage {
    users: RwLock<HashMap<Uuid, User>>,
    sessions: RwLock<HashMap<String, LocalSession>>,
    connectors: RwLock<HashMap<String, IdPConnector>>,
}

impl InMemoryStorage {
    /// Create empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStorage {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict {
                context: format!("username {}", user.username),
            });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.users.write().await.remove(&id);
        // Mirror the relational cascade: a deleted user leaves no sessions
        self.sessions.write().await.retain(|_, s| s.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryStorage {
    async fn create(&self, session: &LocalSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.token) {
            return Err(RepositoryError::Conflict {
                context: "session token".to_owned(),
            });
        }
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn by_token(&self, token: &str) -> Result<Option<LocalSession>, RepositoryError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        self.sessions
            .write()
            .await
            .retain(|_, s| s.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl ConnectorRepository for InMemoryStorage {
    async fn put(&self, connector: &IdPConnector) -> Result<(), RepositoryError> {
        self.connectors
            .write()
            .await
            .insert(connector.id.clone(), connector.clone());
        Ok(())
    }

    async fn by_id(&self, id: &str) -> Result<Option<IdPConnector>, RepositoryError> {
        Ok(self.connectors.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<IdPConnector>, RepositoryError> {
        let mut connectors: Vec<IdPConnector> =
            self.connectors.read().await.values().cloned().collect();
        connectors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(connectors)
    }
}
