// ABOUTME: Opaque password hashing primitive over bcrypt
// ABOUTME: hash/verify plus random placeholder digests for federated identities
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! The rest of the codebase treats password hashing as an opaque
//! `hash(plaintext) -> digest` / `verify(plaintext, digest) -> bool` pair;
//! bcrypt is the implementation detail confined to this module.

use anyhow::{Context, Result};
use rand::RngCore;

/// Hash a plaintext credential into a storable digest
///
/// # Errors
/// Returns an error if the underlying hash primitive fails
pub fn hash(plaintext: &str) -> Result<String> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST).context("hash password")
}

/// Verify a plaintext credential against a stored digest.
/// Malformed digests verify as false rather than erroring, so a corrupt
/// record behaves like a wrong password.
#[must_use]
pub fn verify(plaintext: &str, digest: &str) -> bool {
    bcrypt::verify(plaintext, digest).unwrap_or(false)
}

/// Digest of a fresh random value, for identities that never log in with a
/// password (federated accounts). Unguessable by construction.
///
/// # Errors
/// Returns an error if the hash primitive fails
pub fn random_placeholder() -> Result<String> {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hash(&hex::encode(bytes))
}
