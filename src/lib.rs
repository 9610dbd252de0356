// ABOUTME: Library entry point for the Gatehouse identity provider
// ABOUTME: Single-tenant OAuth2/OIDC token issuance with local and federated login
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

#![deny(unsafe_code)]

//! # Gatehouse
//!
//! A single-tenant identity provider that issues OAuth2/OpenID Connect
//! tokens to relying-party applications. End users authenticate with a local
//! password credential or by federating to an upstream identity provider,
//! whose claims are linked to (or minted into) a local identity.
//!
//! ## Architecture
//!
//! - **Protocol engine** ([`oidc`]): the authorize→code→token state machine,
//!   discovery, and token signing
//! - **Grant store** ([`store`]): single-use codes, rotating refresh tokens,
//!   cascade revocation, assertion replay cache
//! - **Client registry** ([`clients`]): relying-party metadata and secret
//!   verification
//! - **Sessions** ([`auth`]) and **accounts** ([`users`]): local credential
//!   login and lifecycle
//! - **Federation** ([`federation`]): upstream code exchange and identity
//!   resolution
//! - **Repositories** ([`storage`]): persistence capability with in-memory
//!   and SQLite implementations
//!
//! The engine and services return typed outcomes; only [`routes`] speaks
//! HTTP.

/// Local credential verification and session management
pub mod auth;

/// Relying-party client registry
pub mod clients;

/// Environment-based configuration
pub mod config;

/// Password digests and signing keys
pub mod crypto;

/// Unified error taxonomy
pub mod errors;

/// Federation resolver for upstream identity providers
pub mod federation;

/// Structured logging setup
pub mod logging;

/// Core domain models
pub mod models;

/// OAuth2/OIDC protocol engine
pub mod oidc;

/// HTTP boundary
pub mod routes;

/// Grant and token store
pub mod store;

/// Repository traits and implementations
pub mod storage;

/// User account lifecycle
pub mod users;
