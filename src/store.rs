// ABOUTME: In-process grant and token store with single-use and revocation semantics
// ABOUTME: Keyed stores for codes, tokens, PKCE, OIDC continuations, and assertion replay
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Gatehouse Contributors

//! # Grant/Token Store
//!
//! The only shared mutable structure in the core. One [`GrantStore`] is
//! created at process start, owned by `main`, and passed by reference into
//! the protocol engine; there is no ambient singleton.
//!
//! Semantics beyond plain CRUD:
//! - Authorization codes are single-use. Looking one up after invalidation
//!   still returns its snapshot but tagged as consumed, so the engine can
//!   distinguish replay (cascade-revoke the grant chain) from absence
//!   (plain rejection).
//! - Access and refresh tokens carry a secondary index
//!   `request_id -> current signature`, enabling revocation of a whole grant
//!   chain without knowing the signatures.
//! - [`GrantStore::rotate`] revokes the prior refresh token and its sibling
//!   access token through the indexes before the caller mints replacements,
//!   closing the replay window deterministically.
//! - The client-assertion replay cache records `jti -> expiry` and reaps
//!   expired entries opportunistically on insert.
//!
//! All entries are volatile (process lifetime). A production deployment
//! scaling past one node would back this with a durable keyed store honoring
//! the same contract.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::oidc::models::RequestSnapshot;

/// Store-level error distinguishing absence from single-use replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No entry under this key
    #[error("not found")]
    NotFound,
    /// Single-use entry exists but was already consumed
    #[error("already used")]
    AlreadyUsed,
}

/// Result of an authorization code lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeLookup {
    /// Code is live and redeemable
    Active {
        /// Snapshot of the originating request
        snapshot: RequestSnapshot,
        /// Redemption deadline
        expires_at: DateTime<Utc>,
    },
    /// Code was already redeemed; snapshot returned so the caller can
    /// cascade-revoke the grant chain
    Consumed {
        /// Snapshot of the originating request
        snapshot: RequestSnapshot,
    },
}

/// Result of a refresh token lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshLookup {
    /// Token is live
    Active {
        /// Snapshot of the originating request
        snapshot: RequestSnapshot,
        /// Signature of the sibling access token minted with this refresh token
        access_token_signature: String,
        /// Expiry of the refresh token itself
        expires_at: DateTime<Utc>,
    },
    /// Token was revoked (rotation or cascade); snapshot returned so reuse
    /// can be treated as a replay event
    Revoked {
        /// Snapshot of the originating request
        snapshot: RequestSnapshot,
    },
}

/// A stored access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    /// Snapshot of the originating request
    pub snapshot: RequestSnapshot,
    /// Hard expiry of the token
    pub expires_at: DateTime<Utc>,
}

/// PKCE challenge bound to an authorization code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceRecord {
    /// The code challenge presented at authorize time
    pub challenge: String,
    /// Challenge method; only `S256` is ever stored
    pub method: String,
}

#[derive(Debug, Clone)]
struct CodeRecord {
    snapshot: RequestSnapshot,
    expires_at: DateTime<Utc>,
    active: bool,
}

#[derive(Debug, Clone)]
struct RefreshRecord {
    snapshot: RequestSnapshot,
    access_token_signature: String,
    expires_at: DateTime<Utc>,
    active: bool,
}

#[derive(Default)]
struct StoreState {
    codes: HashMap<String, CodeRecord>,
    access_tokens: HashMap<String, AccessRecord>,
    refresh_tokens: HashMap<String, RefreshRecord>,
    pkce: HashMap<String, PkceRecord>,
    continuations: HashMap<String, RequestSnapshot>,
    // request_id -> current signature
    access_index: HashMap<String, String>,
    refresh_index: HashMap<String, String>,
    used_jtis: HashMap<String, DateTime<Utc>>,
}

/// Keyed stores for every grant kind, serialized under one exclusive lock so
/// no two concurrent redemptions of the same credential can both succeed
#[derive(Default)]
pub struct GrantStore {
    state: RwLock<StoreState>,
}

impl GrantStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Authorization codes ─────────────────────────────────────────────

    /// Store a live authorization code
    pub fn put_authorization_code(
        &self,
        signature: &str,
        snapshot: RequestSnapshot,
        expires_at: DateTime<Utc>,
    ) {
        self.write().codes.insert(
            signature.to_owned(),
            CodeRecord {
                snapshot,
                expires_at,
                active: true,
            },
        );
    }

    /// Look up an authorization code. A consumed code still returns its
    /// snapshot, tagged [`CodeLookup::Consumed`].
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when no code exists under this signature
    pub fn authorization_code(&self, signature: &str) -> Result<CodeLookup, StoreError> {
        let state = self.read();
        let record = state.codes.get(signature).ok_or(StoreError::NotFound)?;
        if record.active {
            Ok(CodeLookup::Active {
                snapshot: record.snapshot.clone(),
                expires_at: record.expires_at,
            })
        } else {
            Ok(CodeLookup::Consumed {
                snapshot: record.snapshot.clone(),
            })
        }
    }

    /// Flip an authorization code to consumed. Exactly one concurrent caller
    /// observes the active state.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when no code exists under this signature;
    /// [`StoreError::AlreadyUsed`] when it was consumed before this call
    pub fn consume_authorization_code(&self, signature: &str) -> Result<(), StoreError> {
        let mut state = self.write();
        let record = state
            .codes
            .get_mut(signature)
            .ok_or(StoreError::NotFound)?;
        if !record.active {
            return Err(StoreError::AlreadyUsed);
        }
        record.active = false;
        Ok(())
    }

    /// Remove an authorization code entirely
    pub fn delete_authorization_code(&self, signature: &str) {
        self.write().codes.remove(signature);
    }

    // ── Access tokens ───────────────────────────────────────────────────

    /// Store an access token and index it by its request id
    pub fn put_access_token(
        &self,
        signature: &str,
        snapshot: RequestSnapshot,
        expires_at: DateTime<Utc>,
    ) {
        let mut state = self.write();
        state
            .access_index
            .insert(snapshot.request_id.clone(), signature.to_owned());
        state.access_tokens.insert(
            signature.to_owned(),
            AccessRecord {
                snapshot,
                expires_at,
            },
        );
    }

    /// Look up an access token by signature
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when absent (revoked tokens are absent too)
    pub fn access_token(&self, signature: &str) -> Result<AccessRecord, StoreError> {
        self.read()
            .access_tokens
            .get(signature)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// Delete an access token by signature, dropping its index entry when it
    /// is still the current one for the grant
    pub fn delete_access_token(&self, signature: &str) {
        let mut state = self.write();
        if let Some(record) = state.access_tokens.remove(signature) {
            if state
                .access_index
                .get(&record.snapshot.request_id)
                .is_some_and(|current| current == signature)
            {
                state.access_index.remove(&record.snapshot.request_id);
            }
        }
    }

    /// Revoke the current access token of a grant chain without knowing its
    /// signature. No-op when the chain has no live access token.
    pub fn revoke_access_token(&self, request_id: &str) {
        let mut state = self.write();
        if let Some(signature) = state.access_index.remove(request_id) {
            state.access_tokens.remove(&signature);
        }
    }

    // ── Refresh tokens ──────────────────────────────────────────────────

    /// Store a refresh token, recording its sibling access token signature,
    /// and index it by its request id
    pub fn put_refresh_token(
        &self,
        signature: &str,
        access_token_signature: &str,
        snapshot: RequestSnapshot,
        expires_at: DateTime<Utc>,
    ) {
        let mut state = self.write();
        state
            .refresh_index
            .insert(snapshot.request_id.clone(), signature.to_owned());
        state.refresh_tokens.insert(
            signature.to_owned(),
            RefreshRecord {
                snapshot,
                access_token_signature: access_token_signature.to_owned(),
                expires_at,
                active: true,
            },
        );
    }

    /// Look up a refresh token. A revoked token still returns its snapshot,
    /// tagged [`RefreshLookup::Revoked`], so reuse is detectable as replay.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when no token exists under this signature
    pub fn refresh_token(&self, signature: &str) -> Result<RefreshLookup, StoreError> {
        let state = self.read();
        let record = state
            .refresh_tokens
            .get(signature)
            .ok_or(StoreError::NotFound)?;
        if record.active {
            Ok(RefreshLookup::Active {
                snapshot: record.snapshot.clone(),
                access_token_signature: record.access_token_signature.clone(),
                expires_at: record.expires_at,
            })
        } else {
            Ok(RefreshLookup::Revoked {
                snapshot: record.snapshot.clone(),
            })
        }
    }

    /// Remove a refresh token entirely
    pub fn delete_refresh_token(&self, signature: &str) {
        let mut state = self.write();
        if let Some(record) = state.refresh_tokens.remove(signature) {
            if state
                .refresh_index
                .get(&record.snapshot.request_id)
                .is_some_and(|current| current == signature)
            {
                state.refresh_index.remove(&record.snapshot.request_id);
            }
        }
    }

    /// Mark the current refresh token of a grant chain revoked. The record
    /// is kept so later reuse surfaces as [`RefreshLookup::Revoked`].
    pub fn revoke_refresh_token(&self, request_id: &str) {
        let mut state = self.write();
        if let Some(signature) = state.refresh_index.get(request_id).cloned() {
            if let Some(record) = state.refresh_tokens.get_mut(&signature) {
                record.active = false;
            }
        }
    }

    /// Rotation-on-use: revoke the prior refresh token and its sibling
    /// access token. The caller mints replacements under the same request id
    /// afterwards; until then the grant chain has no live tokens.
    pub fn rotate(&self, request_id: &str) {
        self.revoke_refresh_token(request_id);
        self.revoke_access_token(request_id);
    }

    // ── PKCE ────────────────────────────────────────────────────────────

    /// Bind a PKCE challenge to an authorization code signature
    pub fn put_pkce(&self, code_signature: &str, record: PkceRecord) {
        self.write().pkce.insert(code_signature.to_owned(), record);
    }

    /// Remove and return the PKCE challenge for a code, if any
    pub fn take_pkce(&self, code_signature: &str) -> Option<PkceRecord> {
        self.write().pkce.remove(code_signature)
    }

    // ── OIDC continuations ──────────────────────────────────────────────

    /// Store the OIDC continuation for a code, kept separate from the code
    /// record itself
    pub fn put_continuation(&self, code_signature: &str, snapshot: RequestSnapshot) {
        self.write()
            .continuations
            .insert(code_signature.to_owned(), snapshot);
    }

    /// Remove and return the OIDC continuation for a code, if any
    pub fn take_continuation(&self, code_signature: &str) -> Option<RequestSnapshot> {
        self.write().continuations.remove(code_signature)
    }

    // ── Client assertion replay cache ───────────────────────────────────

    /// Record a client assertion `jti`, reaping expired entries first.
    ///
    /// # Errors
    /// [`StoreError::AlreadyUsed`] when the `jti` is present and unexpired
    pub fn mark_jti_used(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.write();
        let now = Utc::now();
        state.used_jtis.retain(|_, exp| *exp > now);
        if state.used_jtis.contains_key(jti) {
            return Err(StoreError::AlreadyUsed);
        }
        state.used_jtis.insert(jti.to_owned(), expires_at);
        Ok(())
    }
}
