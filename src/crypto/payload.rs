// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payload encryption with the per-file key.
//!
//! Sealed form: `version (1) | nonce (12) | ciphertext | tag (16)`.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use super::{FileKey, WrapError};

const PAYLOAD_VERSION: u8 = 0x01;
const PAYLOAD_AAD: &[u8] = b"cryptovault/payload/v1";
const TAG_LEN: usize = 16;

/// A sealed payload could not be opened with the key it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload could not be decrypted")]
    Undecryptable,
}

fn content_key(key: &FileKey) -> Result<LessSafeKey, WrapError> {
    UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map(LessSafeKey::new)
        .map_err(|_| WrapError::Cipher)
}

/// Encrypt file contents under the file key with a random nonce.
pub fn seal_payload(key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>, WrapError> {
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| WrapError::Randomness)?;

    let mut sealed = Vec::with_capacity(1 + NONCE_LEN + plaintext.len() + TAG_LEN);
    sealed.push(PAYLOAD_VERSION);
    sealed.extend_from_slice(&nonce);

    let mut in_out = plaintext.to_vec();
    content_key(key)?
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(PAYLOAD_AAD),
            &mut in_out,
        )
        .map_err(|_| WrapError::Cipher)?;

    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Decrypt a sealed payload. The plaintext is erased when dropped.
pub fn open_payload(key: &FileKey, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, PayloadError> {
    if sealed.len() < 1 + NONCE_LEN + TAG_LEN || sealed[0] != PAYLOAD_VERSION {
        return Err(PayloadError::Undecryptable);
    }

    let nonce = Nonce::try_assume_unique_for_key(&sealed[1..1 + NONCE_LEN])
        .map_err(|_| PayloadError::Undecryptable)?;
    let aead = content_key(key).map_err(|_| PayloadError::Undecryptable)?;

    let mut in_out = Zeroizing::new(sealed[1 + NONCE_LEN..].to_vec());
    let plain_len = aead
        .open_in_place(nonce, Aad::from(PAYLOAD_AAD), &mut in_out[..])
        .map_err(|_| PayloadError::Undecryptable)?
        .len();
    in_out.truncate(plain_len);
    Ok(in_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_payload_opens_with_same_key() {
        let key = FileKey::generate().unwrap();
        let sealed = seal_payload(&key, b"quarterly report").unwrap();

        assert_ne!(&sealed[1 + NONCE_LEN..], b"quarterly report");
        assert_eq!(open_payload(&key, &sealed).unwrap().as_slice(), b"quarterly report");
    }

    #[test]
    fn empty_payload_round_trips() {
        let key = FileKey::generate().unwrap();
        let sealed = seal_payload(&key, b"").unwrap();
        assert!(open_payload(&key, &sealed).unwrap().is_empty());
    }

    #[test]
    fn wrong_key_is_undecryptable() {
        let sealed = seal_payload(&FileKey::generate().unwrap(), b"data").unwrap();
        let other = FileKey::generate().unwrap();
        assert_eq!(open_payload(&other, &sealed), Err(PayloadError::Undecryptable));
    }

    #[test]
    fn short_or_unversioned_input_is_undecryptable() {
        let key = FileKey::generate().unwrap();
        assert_eq!(open_payload(&key, b"short"), Err(PayloadError::Undecryptable));

        let mut sealed = seal_payload(&key, b"data").unwrap();
        sealed[0] = 0x09;
        assert_eq!(open_payload(&key, &sealed), Err(PayloadError::Undecryptable));
    }
}
