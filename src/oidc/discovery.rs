// ABOUTME: OIDC discovery document derived from the configured issuer
// ABOUTME: Endpoint URLs are built without trailing-slash duplication
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

use serde::{Deserialize, Serialize};

/// OIDC discovery metadata, served at `/.well-known/openid-configuration`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryDocument {
    /// Issuer URL without trailing slash
    pub issuer: String,
    /// Authorize endpoint
    pub authorization_endpoint: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// Userinfo endpoint
    pub userinfo_endpoint: String,
    /// JWKS endpoint
    pub jwks_uri: String,
    /// Supported scopes
    pub scopes_supported: Vec<String>,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Supported subject types
    pub subject_types_supported: Vec<String>,
    /// ID token signing algorithms
    pub id_token_signing_alg_values_supported: Vec<String>,
    /// Token endpoint authentication methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Supported claims
    pub claims_supported: Vec<String>,
}

impl DiscoveryDocument {
    /// Build the document for the given issuer. Trailing slashes on the
    /// issuer are stripped so endpoint URLs never contain double slashes.
    #[must_use]
    pub fn for_issuer(issuer: &str) -> Self {
        let base = issuer.trim_end_matches('/');
        let strs = |v: &[&str]| v.iter().map(|s| (*s).to_owned()).collect();
        Self {
            issuer: base.to_owned(),
            authorization_endpoint: format!("{base}/authorize"),
            token_endpoint: format!("{base}/token"),
            userinfo_endpoint: format!("{base}/userinfo"),
            jwks_uri: format!("{base}/jwks.json"),
            scopes_supported: strs(&["openid", "profile", "email", "offline_access"]),
            response_types_supported: strs(&["code"]),
            grant_types_supported: strs(&["authorization_code", "refresh_token"]),
            subject_types_supported: strs(&["public"]),
            id_token_signing_alg_values_supported: strs(&["RS256"]),
            token_endpoint_auth_methods_supported: strs(&[
                "client_secret_post",
                "client_secret_basic",
            ]),
            claims_supported: strs(&[
                "sub",
                "iss",
                "aud",
                "exp",
                "iat",
                "email",
                "preferred_username",
            ]),
        }
    }
}
