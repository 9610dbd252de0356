// ABOUTME: RS256 signing key management for ID tokens
// ABOUTME: RSA key generation, PEM bridging into jsonwebtoken, and JWKS serialization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Signing Keys
//!
//! A single RSA key pair, generated at process start, signs ID tokens with
//! RS256. The public half is served via the JWKS endpoint so relying parties
//! can validate signatures. The private key never leaves the process.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
    pkcs8::{EncodePrivateKey, EncodePublicKey},
    traits::PublicKeyParts,
    RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};

/// RSA key size in bits for RS256
const RSA_KEY_SIZE: usize = 2048;

/// JWK (JSON Web Key) representation for the JWKS endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "RSA")
    pub kty: String,
    /// Public key use (always "sig")
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key identifier
    pub kid: String,
    /// Algorithm (RS256)
    pub alg: String,
    /// RSA modulus, base64url encoded
    pub n: String,
    /// RSA exponent, base64url encoded
    pub e: String,
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Public keys
    pub keys: Vec<JsonWebKey>,
}

/// RSA signing key pair with prepared jsonwebtoken handles
pub struct SigningKey {
    /// Key identifier carried in token headers and the JWKS document
    pub kid: String,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Key creation timestamp
    pub created_at: DateTime<Utc>,
}

impl SigningKey {
    /// Generate a fresh RSA key pair
    ///
    /// # Errors
    /// Returns an error if key generation or PEM encoding fails
    pub fn generate(kid: &str) -> Result<Self> {
        Self::generate_with_key_size(kid, RSA_KEY_SIZE)
    }

    /// Generate with a configurable key size (smaller keys keep tests fast)
    ///
    /// # Errors
    /// Returns an error if key generation or PEM encoding fails
    pub fn generate_with_key_size(kid: &str, key_size_bits: usize) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, key_size_bits)
            .map_err(|e| anyhow!("generate RSA private key: {e}"))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .map_err(|e| anyhow!("encode private key PEM: {e}"))?;
        let public_pem = public_key
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .map_err(|e| anyhow!("encode public key PEM: {e}"))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| anyhow!("build encoding key: {e}"))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| anyhow!("build decoding key: {e}"))?;

        Ok(Self {
            kid: kid.to_string(),
            public_key,
            encoding_key,
            decoding_key,
            created_at: Utc::now(),
        })
    }

    /// Encoding key for RS256 signing
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Decoding key for signature verification
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Public half in JWK form
    #[must_use]
    pub fn to_jwk(&self) -> JsonWebKey {
        let n_bytes = self.public_key.n().to_bytes_be();
        let e_bytes = self.public_key.e().to_bytes_be();

        JsonWebKey {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            kid: self.kid.clone(),
            alg: "RS256".to_string(),
            n: URL_SAFE_NO_PAD.encode(n_bytes),
            e: URL_SAFE_NO_PAD.encode(e_bytes),
        }
    }

    /// JWKS document containing this key
    #[must_use]
    pub fn jwks(&self) -> JsonWebKeySet {
        JsonWebKeySet {
            keys: vec![self.to_jwk()],
        }
    }
}
