// ABOUTME: OAuth2/OIDC protocol engine module
// ABOUTME: Authorize/token/introspect state machine, discovery, and token signing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

/// OIDC discovery document
pub mod discovery;
/// The authorize/token/introspect state machine
pub mod endpoints;
/// Request, response, and snapshot data models
pub mod models;
/// Opaque token minting, signatures, and RS256 ID token signing
pub mod tokens;

/// The OAuth2/OIDC authorization server
pub use endpoints::AuthorizationServer;
/// Fixed per-deployment credential lifetimes
pub use endpoints::TokenLifetimes;

/// Authorization request
pub use models::AuthorizeRequest;
/// Outcome of an authorize call
pub use models::AuthorizeOutcome;
/// OAuth 2.0 error response
pub use models::OAuth2Error;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;

/// OIDC discovery metadata
pub use discovery::DiscoveryDocument;
