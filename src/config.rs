// ABOUTME: Environment-based configuration for deployment settings
// ABOUTME: Issuer, port, database URL, lifetimes, and static client/connector seeds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Configuration
//!
//! All runtime configuration comes from environment variables with sensible
//! defaults; there is no configuration file. Clients and connectors are
//! provisioned statically through JSON-valued variables (single-tenant,
//! admin-managed — this provider has no dynamic registration).

use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use std::env;

use crate::models::IdPConnector;
use crate::oidc::TokenLifetimes;

/// Default issuer when none is configured
const DEFAULT_ISSUER: &str = "http://localhost:8888";
/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8888;
/// Default upstream exchange timeout in seconds
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 5;

/// A statically provisioned relying party. The secret is plaintext here and
/// digested at load time; only the digest is ever held by the registry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClientSeed {
    /// Client identifier
    pub client_id: String,
    /// Client secret (digested at load)
    pub client_secret: String,
    /// Exact redirect URIs
    pub redirect_uris: Vec<String>,
    /// Scopes the client may request
    pub scopes: Vec<String>,
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// This provider's issuer URL, trailing slash stripped
    pub issuer: String,
    /// HTTP listen port
    pub http_port: u16,
    /// Database URL; `sqlite:...` or `memory:` for the in-memory backend
    pub database_url: String,
    /// Timeout for upstream federation calls
    pub upstream_timeout_secs: u64,
    /// Access token lifetime in minutes
    pub access_token_minutes: i64,
    /// Refresh token lifetime in hours
    pub refresh_token_hours: i64,
    /// ID token lifetime in minutes
    pub id_token_minutes: i64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Statically provisioned relying parties
    pub clients: Vec<ClientSeed>,
    /// Statically provisioned upstream connectors
    pub connectors: Vec<IdPConnector>,
}

impl ServerConfig {
    /// Load configuration from `GATEHOUSE_*` environment variables
    ///
    /// # Errors
    /// Returns an error when a variable is present but unparseable
    pub fn from_env() -> Result<Self> {
        let issuer = env_or("GATEHOUSE_ISSUER", DEFAULT_ISSUER)
            .trim_end_matches('/')
            .to_owned();
        let http_port = parse_env("GATEHOUSE_HTTP_PORT", DEFAULT_HTTP_PORT)?;
        let database_url = env_or("GATEHOUSE_DATABASE_URL", "sqlite:gatehouse.db");
        let upstream_timeout_secs =
            parse_env("GATEHOUSE_UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?;
        let access_token_minutes = parse_env("GATEHOUSE_ACCESS_TOKEN_MINUTES", 30)?;
        let refresh_token_hours = parse_env("GATEHOUSE_REFRESH_TOKEN_HOURS", 24)?;
        let id_token_minutes = parse_env("GATEHOUSE_ID_TOKEN_MINUTES", 60)?;
        let log_level = env_or("GATEHOUSE_LOG_LEVEL", "info");

        let clients = parse_json_env("GATEHOUSE_CLIENTS")?;
        let connectors = parse_json_env("GATEHOUSE_CONNECTORS")?;

        Ok(Self {
            issuer,
            http_port,
            database_url,
            upstream_timeout_secs,
            access_token_minutes,
            refresh_token_hours,
            id_token_minutes,
            log_level,
            clients,
            connectors,
        })
    }

    /// Credential lifetimes for the protocol engine
    #[must_use]
    pub fn token_lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access_token: Duration::minutes(self.access_token_minutes),
            refresh_token: Duration::hours(self.refresh_token_hours),
            id_token: Duration::minutes(self.id_token_minutes),
            ..TokenLifetimes::default()
        }
    }

    /// One-line startup summary, secrets omitted
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "issuer={} port={} database={} clients={} connectors={}",
            self.issuer,
            self.http_port,
            self.database_url,
            self.clients.len(),
            self.connectors.len()
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

fn parse_json_env<T: serde::de::DeserializeOwned>(key: &str) -> Result<Vec<T>> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            serde_json::from_str(&value).with_context(|| format!("parse {key} as JSON"))
        }
        _ => Ok(Vec::new()),
    }
}
