// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-account holder secrets derived from one master key.

use ring::hkdf;
use zeroize::Zeroizing;

use super::{HolderSecret, WrapError, KEY_LEN};
use crate::storage::{DataDir, StorageError, StorageResult};

const KEYRING_SALT: &[u8] = b"cryptovault/keyring/v1";

/// Source of each account's current wrapping secret.
pub struct Keyring {
    master: Zeroizing<[u8; KEY_LEN]>,
}

impl Keyring {
    /// Build a keyring from raw master key bytes.
    pub fn from_master(bytes: &[u8]) -> Result<Self, WrapError> {
        let secret = HolderSecret::from_slice(bytes)?;
        Ok(Self {
            master: Zeroizing::new(*secret.as_bytes()),
        })
    }

    /// Build a keyring with a fresh random master key.
    pub fn generate() -> Result<Self, WrapError> {
        let secret = HolderSecret::generate()?;
        Ok(Self {
            master: Zeroizing::new(*secret.as_bytes()),
        })
    }

    /// Load the master key from the data directory, creating it on first boot.
    pub fn load_or_generate(data_dir: &DataDir) -> StorageResult<Self> {
        let path = data_dir.paths().master_key();

        if data_dir.exists(&path) {
            let bytes = Zeroizing::new(data_dir.read_raw(&path)?);
            return Self::from_master(&bytes).map_err(|e| {
                StorageError::Corrupt(format!("keyring master key: {e}"))
            });
        }

        let keyring = Self::generate()
            .map_err(|e| StorageError::Corrupt(format!("keyring generation: {e}")))?;
        data_dir.write_raw(&path, &keyring.master[..])?;
        tracing::info!("Generated new keyring master key");
        Ok(keyring)
    }

    /// Derive the current wrapping secret for an account.
    pub fn secret_for(&self, account_id: &str) -> Result<HolderSecret, WrapError> {
        let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, KEYRING_SALT).extract(&self.master[..]);
        let info = [account_id.as_bytes()];

        let mut secret = Zeroizing::new([0u8; KEY_LEN]);
        prk.expand(&info, hkdf::HKDF_SHA256)
            .and_then(|okm| okm.fill(&mut secret[..]))
            .map_err(|_| WrapError::Cipher)?;

        Ok(HolderSecret::from_array(secret))
    }
}
