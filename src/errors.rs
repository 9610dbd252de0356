// ABOUTME: Unified error handling for the identity provider
// ABOUTME: Defines the error taxonomy, HTTP status mapping, and sanitized public messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Error Taxonomy
//!
//! Every fallible operation in the core maps into one of the codes below. The
//! protocol engine and federation resolver return typed outcomes; only the
//! HTTP boundary converts them to transport responses. Replay and expiry stay
//! distinguishable internally even where the external response is generic.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Malformed or disallowed request parameters
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// Missing client, connector, code, token, or user
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// A resource with this identifier already exists
    #[serde(rename = "CONFLICT")]
    Conflict,
    /// Reuse of a single-use credential (code, refresh token, client assertion)
    #[serde(rename = "REPLAY_DETECTED")]
    Replay,
    /// Credential past its expiry; presented externally like `NotFound`
    #[serde(rename = "EXPIRED")]
    Expired,
    /// Upstream identity provider exchange or userinfo failure
    #[serde(rename = "UPSTREAM_ERROR")]
    Upstream,
    /// Storage or signing failure
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            // Expiry is deliberately indistinguishable from absence on the wire
            Self::NotFound | Self::Expired => 404,
            Self::Conflict => 409,
            // Replayed credentials are rejected like any other invalid grant
            Self::Replay => 400,
            Self::Upstream => 502,
            Self::Internal => 500,
        }
    }

    /// Whether this code marks a security event worth an audit trail
    #[must_use]
    pub const fn is_security_event(self) -> bool {
        matches!(self, Self::Replay)
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Internal, loggable error message
    pub message: String,
    /// Source error for chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach a source error
    #[must_use]
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Malformed or disallowed parameters
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// Missing resource
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Identifier collision
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Single-use credential presented twice
    pub fn replay(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Replay, message)
    }

    /// Credential past its expiry
    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Expired, message)
    }

    /// Upstream exchange failure
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Upstream, message)
    }

    /// Storage or signing failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Message safe to put on the wire. Internal and upstream details are
    /// logged, never leaked.
    #[must_use]
    pub fn public_message(&self) -> &str {
        match self.code {
            ErrorCode::Upstream => "federation_failed",
            ErrorCode::Internal => "internal error",
            _ => &self.message,
        }
    }
}

/// Convenience result alias for application errors
pub type AppResult<T> = Result<T, AppError>;
