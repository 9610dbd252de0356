// ABOUTME: Cryptographic primitives for the identity provider
// ABOUTME: Password digests and RS256 signing key management
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

/// RS256 signing key generation and JWKS serialization
pub mod keys;
/// Opaque password digest primitive
pub mod password;
