// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Integrity verification of stored payloads.
//!
//! The anchored digest is SHA-256 over the ciphertext exactly as stored, so a
//! payload can be checked before any disclosure decision and without the key.

use std::fmt;
use std::sync::Arc;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::CustodyError;
use crate::storage::{FileKeyStore, FileRecord};

const DIGEST_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 digest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Digest of a payload.
    pub fn of(payload: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(payload)))
    }

    /// Parse a 64-character hex digest; case-insensitive.
    pub fn from_hex(encoded: &str) -> Option<Self> {
        let lower = encoded.to_ascii_lowercase();
        let valid = lower.len() == DIGEST_HEX_LEN && hex::decode(&lower).is_ok();
        valid.then_some(Self(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against the digest of `payload`.
    pub fn matches(&self, payload: &[u8]) -> bool {
        let actual = Self::of(payload);
        ring::constant_time::verify_slices_are_equal(self.0.as_bytes(), actual.0.as_bytes())
            .is_ok()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded)
            .ok_or_else(|| de::Error::custom("content hash must be 64 hex characters"))
    }
}

/// Compares retrieved payloads against anchored hashes.
#[derive(Clone)]
pub struct IntegrityVerifier {
    store: Arc<FileKeyStore>,
}

impl IntegrityVerifier {
    pub fn new(store: Arc<FileKeyStore>) -> Self {
        Self { store }
    }

    /// Check a payload against the hash anchored for `file_id`.
    pub fn verify(&self, file_id: &str, payload: &[u8]) -> Result<(), CustodyError> {
        let record = self
            .store
            .get_record(file_id)?
            .ok_or(CustodyError::NotFound)?;
        Self::verify_record(&record, payload)
    }

    pub fn verify_record(record: &FileRecord, payload: &[u8]) -> Result<(), CustodyError> {
        if record.content_hash.matches(payload) {
            Ok(())
        } else {
            tracing::warn!(file_id = %record.file_id, "Stored payload failed integrity check");
            Err(CustodyError::TamperDetected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{FileKey, HolderSecret};
    use crate::providers::{MemoryObjectStore, ObjectStore, StaticDirectory};
    use crate::storage::{NewFileRecord, RecordDatabase};
    use tempfile::TempDir;

    #[test]
    fn digest_is_lowercase_sha256_hex() {
        assert_eq!(
            ContentHash::of(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn from_hex_validates_and_lowercases() {
        let upper = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        assert_eq!(ContentHash::from_hex(upper), Some(ContentHash::of(b"abc")));
        assert_eq!(ContentHash::from_hex("abc"), None);
        assert_eq!(ContentHash::from_hex(&"zz".repeat(32)), None);
    }

    #[test]
    fn serde_rejects_malformed_hash() {
        let ok: ContentHash =
            serde_json::from_str(&format!("\"{}\"", ContentHash::of(b"x"))).unwrap();
        assert!(ok.matches(b"x"));
        assert!(serde_json::from_str::<ContentHash>("\"nothex\"").is_err());
    }

    #[tokio::test]
    async fn verify_detects_mutation_after_anchoring() {
        let temp = TempDir::new().unwrap();
        let objects = Arc::new(MemoryObjectStore::new());
        let store = Arc::new(FileKeyStore::new(
            RecordDatabase::open(&temp.path().join("records.redb")).unwrap(),
            objects.clone(),
            Arc::new(StaticDirectory::new()),
        ));
        let verifier = IntegrityVerifier::new(store.clone());

        let ciphertext = b"stored ciphertext".to_vec();
        objects.put("secure_vault_files/a", ciphertext.clone()).await.unwrap();
        store
            .register(
                NewFileRecord {
                    file_id: "a".to_string(),
                    file_name: "a.txt".to_string(),
                    owner_id: "alice".to_string(),
                    content_hash: ContentHash::of(&ciphertext),
                    storage_locator: "secure_vault_files/a".to_string(),
                },
                &FileKey::generate().unwrap(),
                &HolderSecret::generate().unwrap(),
            )
            .await
            .unwrap();

        let retrieved = objects.get("secure_vault_files/a").await.unwrap();
        assert_eq!(verifier.verify("a", &retrieved), Ok(()));

        assert!(objects.corrupt("secure_vault_files/a"));
        let retrieved = objects.get("secure_vault_files/a").await.unwrap();
        assert_eq!(
            verifier.verify("a", &retrieved),
            Err(CustodyError::TamperDetected)
        );
        assert_eq!(
            verifier.verify("missing", &retrieved),
            Err(CustodyError::NotFound)
        );
    }
}
