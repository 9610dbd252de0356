// ABOUTME: Opaque token minting, signature derivation, and RS256 ID token signing
// ABOUTME: Tokens handed to clients are random; stores key off derived signatures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! Every code and token handed to a client is 32 bytes of OS randomness,
//! base64url encoded. Stores never hold that plaintext: they key off the
//! SHA-256 digest of it (the "signature"), so a leaked store snapshot cannot
//! be replayed against the token endpoint.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::models::RequestSnapshot;
use crate::crypto::keys::SigningKey;

/// An opaque credential together with its storage signature
#[derive(Debug, Clone)]
pub struct OpaqueToken {
    /// The random value handed to the client
    pub token: String,
    /// SHA-256 digest of the token; the store key
    pub signature: String,
}

/// Mint a fresh opaque token from 32 bytes of OS randomness
#[must_use]
pub fn mint_opaque_token() -> OpaqueToken {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let signature = signature_of(&token);
    OpaqueToken { token, signature }
}

/// Derive the storage signature for a presented token
#[must_use]
pub fn signature_of(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Claims carried by a signed ID token
#[derive(Debug, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject (user id)
    pub sub: String,
    /// Audience (client id)
    pub aud: String,
    /// Expiry timestamp
    pub exp: i64,
    /// Issued-at timestamp
    pub iat: i64,
    /// Nonce from the authorization request, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Email, released under the `email` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Preferred username, released under the `profile` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

/// Signs ID tokens with the provider's active RS256 key
pub struct IdTokenSigner {
    issuer: String,
    key: Arc<SigningKey>,
    lifetime: Duration,
}

impl IdTokenSigner {
    /// Create a signer for the given issuer and key
    #[must_use]
    pub fn new(issuer: String, key: Arc<SigningKey>, lifetime: Duration) -> Self {
        Self {
            issuer,
            key,
            lifetime,
        }
    }

    /// Sign an ID token for the given grant snapshot
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails
    pub fn mint(&self, snapshot: &RequestSnapshot) -> Result<String> {
        let now = Utc::now();
        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: snapshot.subject.clone(),
            aud: snapshot.client_id.clone(),
            exp: (now + self.lifetime).timestamp(),
            iat: now.timestamp(),
            nonce: snapshot.nonce.clone(),
            email: snapshot.profile.email.clone(),
            preferred_username: snapshot.profile.preferred_username.clone(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.kid.clone());

        jsonwebtoken::encode(&header, &claims, self.key.encoding_key())
            .map_err(|e| anyhow!("sign id token: {e}"))
    }
}
