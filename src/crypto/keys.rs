// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-size key material with erase-on-drop.

use std::fmt;

use base64ct::{Base64, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use super::WrapError;

/// Length of file keys and holder secrets (AES-256).
pub const KEY_LEN: usize = 32;

fn random_array() -> Result<Zeroizing<[u8; KEY_LEN]>, WrapError> {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    SystemRandom::new()
        .fill(&mut bytes[..])
        .map_err(|_| WrapError::Randomness)?;
    Ok(bytes)
}

/// Per-file symmetric content key.
///
/// Cloning copies into another zeroizing buffer; every copy is erased when
/// dropped.
#[derive(Clone)]
pub struct FileKey(Zeroizing<[u8; KEY_LEN]>);

impl FileKey {
    /// Generate a fresh random key.
    pub fn generate() -> Result<Self, WrapError> {
        random_array().map(Self)
    }

    /// Build a key from raw bytes, rejecting any length other than 32.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WrapError> {
        if bytes.len() != KEY_LEN {
            return Err(WrapError::KeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Base64 rendering for disclosure to an authenticated holder.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(Base64::encode_string(&self.0[..]))
    }
}

impl PartialEq for FileKey {
    fn eq(&self, other: &Self) -> bool {
        ring::constant_time::verify_slices_are_equal(&self.0[..], &other.0[..]).is_ok()
    }
}

impl Eq for FileKey {}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(<redacted>)")
    }
}

/// Holder-specific wrapping secret.
pub struct HolderSecret(Zeroizing<[u8; KEY_LEN]>);

impl HolderSecret {
    pub fn generate() -> Result<Self, WrapError> {
        random_array().map(Self)
    }

    /// Build a secret from raw bytes, rejecting any length other than 32.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WrapError> {
        if bytes.len() != KEY_LEN {
            return Err(WrapError::SecretLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut secret = Zeroizing::new([0u8; KEY_LEN]);
        secret.copy_from_slice(bytes);
        Ok(Self(secret))
    }

    pub(crate) fn from_array(bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for HolderSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HolderSecret(<redacted>)")
    }
}
