// ABOUTME: SQLite repository implementations over a sqlx connection pool
// ABOUTME: Schema bootstrap with foreign-key cascade from users to sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use super::{ConnectorRepository, RepositoryError, SessionRepository, UserRepository};
use crate::models::{IdPConnector, LocalSession, User};

/// SQLite-backed users, sessions, and connectors. One pool implements all
/// three repository capabilities.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Connect to the given SQLite URL (e.g. `sqlite:gatehouse.db` or
    /// `sqlite::memory:`) and bootstrap the schema
    ///
    /// # Errors
    /// Returns an error if the connection or schema setup fails
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(query_err)?
            .create_if_missing(true)
            .foreign_keys(true);
        // An in-memory database exists per connection; pooling past one
        // would hand out empty databases.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(query_err)?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token TEXT NOT NULL UNIQUE,
                expires_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS idp_connectors (
                id TEXT PRIMARY KEY,
                issuer TEXT NOT NULL,
                client_id TEXT NOT NULL,
                client_secret TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(())
    }
}

fn query_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Query {
        context: e.to_string(),
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(query_err)?)?,
        username: row.try_get("username").map_err(query_err)?,
        email: row.try_get("email").map_err(query_err)?,
        password_hash: row.try_get("password_hash").map_err(query_err)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at").map_err(query_err)?)?,
    })
}

fn session_from_row(row: &SqliteRow) -> Result<LocalSession, RepositoryError> {
    Ok(LocalSession {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(query_err)?)?,
        user_id: parse_uuid(&row.try_get::<String, _>("user_id").map_err(query_err)?)?,
        token: row.try_get("token").map_err(query_err)?,
        expires_at: parse_timestamp(&row.try_get::<String, _>("expires_at").map_err(query_err)?)?,
    })
}

fn connector_from_row(row: &SqliteRow) -> Result<IdPConnector, RepositoryError> {
    Ok(IdPConnector {
        id: row.try_get("id").map_err(query_err)?,
        issuer: row.try_get("issuer").map_err(query_err)?,
        client_id: row.try_get("client_id").map_err(query_err)?,
        client_secret: row.try_get("client_secret").map_err(query_err)?,
    })
}

fn parse_uuid(value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value).map_err(query_err)
}

fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(query_err)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

#[async_trait]
impl UserRepository for SqliteStorage {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict {
                    context: format!("username {}", user.username),
                }
            } else {
                query_err(e)
            }
        })?;
        Ok(())
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        sqlx::query("SELECT id, username, email, password_hash, created_at FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        sqlx::query(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?
        .map(|row| user_from_row(&row))
        .transpose()
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        sqlx::query(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?
        .map(|row| user_from_row(&row))
        .transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        // Sessions go with the user via ON DELETE CASCADE
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for SqliteStorage {
    async fn create(&self, session: &LocalSession) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?, ?, ?, ?)")
            .bind(session.id.to_string())
            .bind(session.user_id.to_string())
            .bind(&session.token)
            .bind(session.expires_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::Conflict {
                        context: "session token".to_owned(),
                    }
                } else {
                    query_err(e)
                }
            })?;
        Ok(())
    }

    async fn by_token(&self, token: &str) -> Result<Option<LocalSession>, RepositoryError> {
        sqlx::query("SELECT id, user_id, token, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?
            .map(|row| session_from_row(&row))
            .transpose()
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }
}

#[async_trait]
impl ConnectorRepository for SqliteStorage {
    async fn put(&self, connector: &IdPConnector) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO idp_connectors (id, issuer, client_id, client_secret)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                issuer = excluded.issuer,
                client_id = excluded.client_id,
                client_secret = excluded.client_secret
            ",
        )
        .bind(&connector.id)
        .bind(&connector.issuer)
        .bind(&connector.client_id)
        .bind(&connector.client_secret)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn by_id(&self, id: &str) -> Result<Option<IdPConnector>, RepositoryError> {
        sqlx::query("SELECT id, issuer, client_id, client_secret FROM idp_connectors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?
            .map(|row| connector_from_row(&row))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<IdPConnector>, RepositoryError> {
        sqlx::query("SELECT id, issuer, client_id, client_secret FROM idp_connectors ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?
            .iter()
            .map(connector_from_row)
            .collect()
    }
}
