// ABOUTME: Server binary - configuration, dependency wiring, and HTTP serving
// ABOUTME: Builds repositories, store, keys, and engine, then serves the router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Gatehouse Server Binary
//!
//! Starts the identity provider: loads configuration from the environment,
//! provisions the statically configured clients and connectors, and serves
//! the HTTP surface until interrupted.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use gatehouse::auth::SessionManager;
use gatehouse::clients::{Client, ClientRegistry};
use gatehouse::config::ServerConfig;
use gatehouse::crypto::keys::SigningKey;
use gatehouse::crypto::password;
use gatehouse::federation::{FederationService, OidcUpstreamClient};
use gatehouse::logging;
use gatehouse::oidc::AuthorizationServer;
use gatehouse::routes::{router, AppState};
use gatehouse::storage::memory::InMemoryStorage;
use gatehouse::storage::sqlite::SqliteStorage;
use gatehouse::storage::{ConnectorRepository, SessionRepository, UserRepository};
use gatehouse::store::GrantStore;
use gatehouse::users::UserService;

#[derive(Parser)]
#[command(name = "gatehouse-server")]
#[command(about = "Gatehouse - single-tenant OAuth2/OIDC identity provider")]
struct Args {
    /// Override the HTTP listen port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the issuer URL
    #[arg(long)]
    issuer: Option<String>,

    /// Override the database URL (`sqlite:...` or `memory:`)
    #[arg(long)]
    database_url: Option<String>,
}

struct Repositories {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    connectors: Arc<dyn ConnectorRepository>,
}

async fn build_repositories(database_url: &str) -> Result<Repositories> {
    if database_url == "memory:" {
        let storage = Arc::new(InMemoryStorage::new());
        return Ok(Repositories {
            users: storage.clone(),
            sessions: storage.clone(),
            connectors: storage,
        });
    }
    let storage = Arc::new(
        SqliteStorage::connect(database_url)
            .await
            .with_context(|| format!("connect to {database_url}"))?,
    );
    Ok(Repositories {
        users: storage.clone(),
        sessions: storage.clone(),
        connectors: storage,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(issuer) = args.issuer {
        config.issuer = issuer.trim_end_matches('/').to_owned();
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    info!("starting gatehouse: {}", config.summary());

    let repos = build_repositories(&config.database_url).await?;
    for connector in &config.connectors {
        repos
            .connectors
            .put(connector)
            .await
            .with_context(|| format!("provision connector {}", connector.id))?;
    }

    let registry = Arc::new(ClientRegistry::new());
    for seed in &config.clients {
        let secret_hash = password::hash(&seed.client_secret)
            .with_context(|| format!("digest secret for client {}", seed.client_id))?;
        registry.insert(Client::new(
            seed.client_id.clone(),
            secret_hash,
            seed.redirect_uris.clone(),
            seed.scopes.iter().cloned().collect::<HashSet<_>>(),
        ));
    }

    let signing_key = Arc::new(SigningKey::generate(&format!(
        "gatehouse-{}",
        uuid::Uuid::new_v4()
    ))?);
    let store = Arc::new(GrantStore::new());
    let engine = Arc::new(AuthorizationServer::new(
        registry,
        store,
        signing_key.clone(),
        &config.issuer,
        config.token_lifetimes(),
    ));

    let sessions = Arc::new(SessionManager::new(
        repos.users.clone(),
        repos.sessions.clone(),
    ));
    let users = Arc::new(UserService::new(
        repos.users.clone(),
        repos.sessions.clone(),
    ));
    let upstream = Arc::new(OidcUpstreamClient::new(Duration::from_secs(
        config.upstream_timeout_secs,
    ))?);
    let federation = Arc::new(FederationService::new(
        repos.connectors,
        upstream,
        repos.users,
        sessions.clone(),
        &config.issuer,
    ));

    let app = router(AppState {
        engine,
        sessions,
        users,
        federation,
        signing_key,
        issuer: config.issuer.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serve")?;

    Ok(())
}
