// ABOUTME: Structured logging setup over tracing-subscriber
// ABOUTME: EnvFilter-driven levels with pretty or JSON output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

use anyhow::Result;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for development
    Pretty,
    /// JSON output for production log pipelines
    Json,
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level so operators can
/// raise verbosity per module without redeploying.
///
/// # Errors
/// Returns an error if a subscriber is already installed
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }
    Ok(())
}

/// Initialize logging from `GATEHOUSE_LOG_LEVEL` / `GATEHOUSE_LOG_FORMAT`
///
/// # Errors
/// Returns an error if a subscriber is already installed
pub fn init_from_env() -> Result<()> {
    let level = env::var("GATEHOUSE_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    let format = match env::var("GATEHOUSE_LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    init(&level, format)
}
