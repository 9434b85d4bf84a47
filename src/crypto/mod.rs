// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Wrap/Unwrap Engine
//!
//! Stateless envelope encryption for per-file content keys.
//!
//! ## Key Hierarchy
//!
//! ```text
//! keyring master key (32 bytes, data dir)
//!   └─ HKDF-SHA256(info = account_id) → holder secret (per account)
//!        └─ wraps → file key (32 bytes, random per file)
//!             └─ encrypts → file payload (AES-256-GCM)
//! ```
//!
//! ## Security
//!
//! - Plaintext keys only ever live in `Zeroizing` buffers
//! - `unwrap` has exactly one failure value, [`AuthFailure`]
//! - Wrapping is deterministic: the nonce is derived from the secret and key

pub mod keyring;
pub mod keys;
pub mod payload;
pub mod wrap;

pub use keyring::Keyring;
pub use keys::{FileKey, HolderSecret, KEY_LEN};
pub use payload::{open_payload, seal_payload, PayloadError};
pub use wrap::{unwrap, wrap, wrap_bytes, WrappedKey, ENVELOPE_LEN};

/// Error raised while wrapping a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WrapError {
    #[error("file key must be {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("holder secret must be {expected} bytes, got {actual}")]
    SecretLength { expected: usize, actual: usize },

    #[error("system randomness unavailable")]
    Randomness,

    #[error("cipher operation failed")]
    Cipher,
}

/// The only error `unwrap` can produce.
///
/// Wrong secret, malformed envelope and missing envelope all collapse into
/// this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("authentication failed")]
pub struct AuthFailure;
