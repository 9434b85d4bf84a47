// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deterministic AES-256-GCM key wrapping.
//!
//! ## Envelope Layout
//!
//! ```text
//! version (1) | nonce (12) | wrapped key (32) | tag (16)   = 61 bytes
//! ```
//!
//! The nonce is synthetic: HMAC-SHA256 over the plaintext key, keyed by a
//! subkey of the holder secret. The same `(key, secret)` pair always yields
//! the same envelope, and distinct keys under one secret never share a nonce.

use std::fmt;

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::hkdf;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{AuthFailure, FileKey, HolderSecret, WrapError, KEY_LEN};

type HmacSha256 = Hmac<Sha256>;

const ENVELOPE_VERSION: u8 = 0x01;
const TAG_LEN: usize = 16;

/// Total size of a wrapped key envelope.
pub const ENVELOPE_LEN: usize = 1 + NONCE_LEN + KEY_LEN + TAG_LEN;

const WRAP_SALT: &[u8] = b"cryptovault/key-wrap/v1";
const WRAP_AAD: &[u8] = b"cryptovault/key-wrap/v1/aad";
const ENC_INFO: &[u8] = b"enc";
const NONCE_INFO: &[u8] = b"nonce";

/// A file key encrypted under a holder secret. Safe to persist.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64ct::Error> {
        Base64::decode_vec(encoded).map(Self)
    }
}

impl fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedKey({} bytes)", self.0.len())
    }
}

impl Serialize for WrappedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for WrappedKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(de::Error::custom)
    }
}

/// Subkeys derived from one holder secret.
struct WrapKeys {
    aead: LessSafeKey,
    nonce_key: Zeroizing<[u8; KEY_LEN]>,
}

impl WrapKeys {
    fn derive(secret: &HolderSecret) -> Result<Self, WrapError> {
        let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, WRAP_SALT).extract(secret.as_bytes());

        let enc = prk
            .expand(&[ENC_INFO], &AES_256_GCM)
            .map_err(|_| WrapError::Cipher)?;
        let aead = LessSafeKey::new(UnboundKey::from(enc));

        let mut nonce_key = Zeroizing::new([0u8; KEY_LEN]);
        prk.expand(&[NONCE_INFO], hkdf::HKDF_SHA256)
            .and_then(|okm| okm.fill(&mut nonce_key[..]))
            .map_err(|_| WrapError::Cipher)?;

        Ok(Self { aead, nonce_key })
    }

    fn synthetic_nonce(&self, key: &FileKey) -> Result<[u8; NONCE_LEN], WrapError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.nonce_key[..])
            .map_err(|_| WrapError::Cipher)?;
        mac.update(key.as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        Ok(nonce)
    }
}

/// Wrap a file key under a holder secret.
pub fn wrap(key: &FileKey, secret: &HolderSecret) -> Result<WrappedKey, WrapError> {
    let keys = WrapKeys::derive(secret)?;
    let nonce = keys.synthetic_nonce(key)?;

    let mut in_out = Zeroizing::new(key.as_bytes().to_vec());
    keys.aead
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(WRAP_AAD),
            &mut *in_out,
        )
        .map_err(|_| WrapError::Cipher)?;

    let mut envelope = Vec::with_capacity(ENVELOPE_LEN);
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&in_out);
    Ok(WrappedKey(envelope))
}

/// Wrap raw key bytes under raw secret bytes.
///
/// Fails only when either input is not exactly 32 bytes.
pub fn wrap_bytes(key: &[u8], secret: &[u8]) -> Result<WrappedKey, WrapError> {
    let key = FileKey::from_slice(key)?;
    let secret = HolderSecret::from_slice(secret)?;
    wrap(&key, &secret)
}

/// Recover the file key from an envelope.
///
/// A malformed envelope still goes through one AEAD open over a decoy buffer
/// so that it costs the same as a wrong secret and fails identically.
pub fn unwrap(wrapped: &WrappedKey, secret: &HolderSecret) -> Result<FileKey, AuthFailure> {
    let keys = WrapKeys::derive(secret).map_err(|_| AuthFailure)?;
    let bytes = wrapped.as_bytes();
    let well_formed = bytes.len() == ENVELOPE_LEN && bytes[0] == ENVELOPE_VERSION;

    let mut nonce = [0u8; NONCE_LEN];
    let mut in_out = Zeroizing::new(vec![0u8; KEY_LEN + TAG_LEN]);
    if well_formed {
        nonce.copy_from_slice(&bytes[1..1 + NONCE_LEN]);
        in_out.copy_from_slice(&bytes[1 + NONCE_LEN..]);
    }

    let opened = keys.aead.open_in_place(
        Nonce::assume_unique_for_key(nonce),
        Aad::from(WRAP_AAD),
        &mut in_out[..],
    );

    match opened {
        Ok(plain) if well_formed => FileKey::from_slice(plain).map_err(|_| AuthFailure),
        _ => Err(AuthFailure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(byte: u8) -> HolderSecret {
        HolderSecret::from_slice(&[byte; KEY_LEN]).unwrap()
    }

    #[test]
    fn unwrap_with_same_secret_returns_key() {
        let key = FileKey::generate().unwrap();
        let s = secret(1);

        let wrapped = wrap(&key, &s).unwrap();
        assert_eq!(wrapped.as_bytes().len(), ENVELOPE_LEN);
        assert_eq!(unwrap(&wrapped, &s).unwrap(), key);
    }

    #[test]
    fn unwrap_with_other_secret_is_auth_failure() {
        let key = FileKey::generate().unwrap();
        let wrapped = wrap(&key, &secret(1)).unwrap();

        for other in [0u8, 2, 0xff] {
            assert_eq!(unwrap(&wrapped, &secret(other)), Err(AuthFailure));
        }
    }

    #[test]
    fn wrap_is_deterministic() {
        let key = FileKey::from_slice(&[9u8; KEY_LEN]).unwrap();
        let a = wrap(&key, &secret(3)).unwrap();
        let b = wrap(&key, &secret(3)).unwrap();
        assert_eq!(a, b);

        let other_key = FileKey::from_slice(&[10u8; KEY_LEN]).unwrap();
        let c = wrap(&other_key, &secret(3)).unwrap();
        assert_ne!(a.as_bytes()[1..1 + NONCE_LEN], c.as_bytes()[1..1 + NONCE_LEN]);
    }

    #[test]
    fn malformed_envelopes_fail_like_wrong_secret() {
        let s = secret(4);
        let key = FileKey::generate().unwrap();
        let good = wrap(&key, &s).unwrap();

        let empty = WrappedKey::from_bytes(Vec::new());
        let truncated = WrappedKey::from_bytes(good.as_bytes()[..20].to_vec());
        let mut bad_version = good.as_bytes().to_vec();
        bad_version[0] = 0x02;
        let mut flipped = good.as_bytes().to_vec();
        flipped[30] ^= 0x01;

        for envelope in [
            empty,
            truncated,
            WrappedKey::from_bytes(bad_version),
            WrappedKey::from_bytes(flipped),
        ] {
            assert_eq!(unwrap(&envelope, &s), Err(AuthFailure));
        }
    }

    #[test]
    fn wrap_bytes_rejects_length_mismatch() {
        assert!(matches!(
            wrap_bytes(&[0u8; 31], &[0u8; 32]),
            Err(WrapError::KeyLength { actual: 31, .. })
        ));
        assert!(matches!(
            wrap_bytes(&[0u8; 32], &[0u8; 8]),
            Err(WrapError::SecretLength { actual: 8, .. })
        ));
        assert!(wrap_bytes(&[0u8; 32], &[1u8; 32]).is_ok());
    }

    #[test]
    fn serde_uses_base64_string() {
        let wrapped = wrap(&FileKey::generate().unwrap(), &secret(5)).unwrap();
        let json = serde_json::to_string(&wrapped).unwrap();
        assert!(json.starts_with('"'));

        let back: WrappedKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wrapped);
    }
}
