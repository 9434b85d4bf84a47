// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Custody Service
//!
//! Composes the key store, disclosure gate, reveal manager and integrity
//! verifier into the upload, download, share and delete flows.
//!
//! ## Download Order
//!
//! ```text
//! require_unlocked -> lookup_for -> object get -> verify -> reveal -> decrypt
//! ```
//!
//! A payload that fails verification is never decrypted and never causes a
//! reveal.

use std::collections::BTreeSet;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::audit_log;
use crate::crypto::{open_payload, seal_payload, FileKey, Keyring};
use crate::error::CustodyError;
use crate::gate::{DisclosureGate, GateStatus, Unlocked};
use crate::integrity::{ContentHash, IntegrityVerifier};
use crate::providers::{Credential, ObjectStore, ObjectStoreError};
use crate::reveal::RevealSessionManager;
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, DataDir, FileKeyStore, FileRecord,
    NewFileRecord,
};

/// Object storage prefix for files kept by their owner.
pub const PERSONAL_PREFIX: &str = "secure_vault_files";
/// Object storage prefix for files uploaded for a recipient.
pub const SHARED_PREFIX: &str = "sharedfiles";

const MAX_FILE_NAME_LEN: usize = 255;

/// A decrypted download. The contents are erased when dropped.
pub struct DownloadedFile {
    pub file_id: String,
    pub file_name: String,
    pub content: Zeroizing<Vec<u8>>,
}

/// Gate state plus reveal set for one subject.
#[derive(Debug, Clone)]
pub struct DisclosureStatus {
    pub gate: GateStatus,
    pub revealed_file_ids: BTreeSet<String>,
}

/// What one maintenance pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_subjects: Vec<String>,
    pub evicted_attempts: usize,
    pub completed_deletes: usize,
}

pub struct CustodyService {
    data_dir: DataDir,
    keyring: Arc<Keyring>,
    store: Arc<FileKeyStore>,
    objects: Arc<dyn ObjectStore>,
    gate: Arc<DisclosureGate>,
    reveal: RevealSessionManager,
    integrity: IntegrityVerifier,
}

impl CustodyService {
    pub fn new(
        data_dir: DataDir,
        keyring: Arc<Keyring>,
        store: Arc<FileKeyStore>,
        objects: Arc<dyn ObjectStore>,
        gate: Arc<DisclosureGate>,
        reveal_capacity: usize,
    ) -> Self {
        let reveal =
            RevealSessionManager::new(gate.clone(), store.clone(), keyring.clone(), reveal_capacity);
        let integrity = IntegrityVerifier::new(store.clone());
        Self {
            data_dir,
            keyring,
            store,
            objects,
            gate,
            reveal,
            integrity,
        }
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Encrypt, store and register a file, optionally routing it to a recipient.
    pub async fn upload(
        &self,
        owner_id: &str,
        file_name: &str,
        plaintext: &[u8],
        recipient_username: Option<&str>,
    ) -> Result<FileRecord, CustodyError> {
        let file_name = file_name.trim();
        if file_name.is_empty() || file_name.chars().count() > MAX_FILE_NAME_LEN {
            return Err(CustodyError::InvalidRequest(format!(
                "file name must be 1 to {MAX_FILE_NAME_LEN} characters"
            )));
        }

        let recipient_id = match recipient_username {
            Some(username) => {
                let id = self.store.resolve_recipient(username).await?;
                if id == owner_id {
                    return Err(CustodyError::InvalidRequest(
                        "cannot share a file with yourself".to_string(),
                    ));
                }
                Some(id)
            }
            None => None,
        };

        let file_id = uuid::Uuid::new_v4().to_string();
        let prefix = if recipient_id.is_some() {
            SHARED_PREFIX
        } else {
            PERSONAL_PREFIX
        };

        let key = FileKey::generate()?;
        let sealed = seal_payload(&key, plaintext)?;
        let content_hash = ContentHash::of(&sealed);

        let locator = self
            .objects
            .put(&format!("{prefix}/{file_id}"), sealed)
            .await
            .map_err(|e| CustodyError::StorageUnavailable(e.to_string()))?;

        let owner_secret = self.keyring.secret_for(owner_id)?;
        let registered = self
            .store
            .register(
                NewFileRecord {
                    file_id: file_id.clone(),
                    file_name: file_name.to_string(),
                    owner_id: owner_id.to_string(),
                    content_hash,
                    storage_locator: locator.clone(),
                },
                &key,
                &owner_secret,
            )
            .await;

        let record = match registered {
            Ok(record) => record,
            Err(e) => {
                self.discard_blob(&locator).await;
                return Err(e);
            }
        };
        audit_log!(
            &self.data_dir,
            AuditEventType::FileRegistered,
            owner_id,
            "file",
            &record.file_id
        );

        let Some(recipient_id) = recipient_id else {
            return Ok(record);
        };

        let shared = match self.keyring.secret_for(&recipient_id) {
            Ok(recipient_secret) => {
                self.store
                    .share(
                        &file_id,
                        owner_id,
                        &recipient_id,
                        &owner_secret,
                        &recipient_secret,
                    )
                    .await
            }
            Err(e) => Err(e.into()),
        };

        match shared {
            Ok(record) => {
                self.audit_share(owner_id, &record);
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&file_id, owner_id).await {
                    tracing::error!(
                        file_id = %file_id,
                        error = %cleanup,
                        "Failed to remove file after share failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Decrypt and return a file to an unlocked holder.
    pub async fn download(
        &self,
        subject_id: &str,
        file_id: &str,
    ) -> Result<DownloadedFile, CustodyError> {
        self.gate.require_unlocked(subject_id)?;
        let record = self.holder_record(subject_id, file_id)?;
        let ciphertext = self.fetch_payload(&record).await?;

        if let Err(e) = IntegrityVerifier::verify_record(&record, &ciphertext) {
            self.audit_tamper(subject_id, file_id);
            return Err(e);
        }

        let key = self.reveal_key(subject_id, file_id)?;
        let content = open_payload(&key, &ciphertext).map_err(|_| {
            tracing::warn!(file_id = %file_id, "Verified payload failed to decrypt");
            CustodyError::DecryptionFailed
        })?;

        audit_log!(
            &self.data_dir,
            AuditEventType::FileDownloaded,
            subject_id,
            "file",
            file_id
        );
        Ok(DownloadedFile {
            file_id: record.file_id,
            file_name: record.file_name,
            content,
        })
    }

    /// Check a holder's file against its anchored hash. Needs no unlock.
    pub async fn verify_file(
        &self,
        subject_id: &str,
        file_id: &str,
    ) -> Result<FileRecord, CustodyError> {
        let record = self.holder_record(subject_id, file_id)?;
        let ciphertext = self.fetch_payload(&record).await?;

        match self.integrity.verify(file_id, &ciphertext) {
            Ok(()) => Ok(record),
            Err(CustodyError::TamperDetected) => {
                self.audit_tamper(subject_id, file_id);
                Err(CustodyError::TamperDetected)
            }
            Err(e) => Err(e),
        }
    }

    /// Share an owned file with a user, by username.
    pub async fn share_file(
        &self,
        owner_id: &str,
        file_id: &str,
        username: &str,
    ) -> Result<FileRecord, CustodyError> {
        self.gate.require_unlocked(owner_id)?;

        let owner_secret = self.keyring.secret_for(owner_id)?;
        let result = self
            .store
            .share_with_username(file_id, owner_id, username, &owner_secret, |recipient| {
                self.keyring.secret_for(recipient).map_err(CustodyError::from)
            })
            .await;

        match result {
            Ok(record) => {
                self.audit_share(owner_id, &record);
                Ok(record)
            }
            Err(e) => {
                self.audit_denied(owner_id, file_id, &e);
                Err(e)
            }
        }
    }

    pub async fn delete_file(&self, subject_id: &str, file_id: &str) -> Result<(), CustodyError> {
        if let Err(e) = self.store.delete(file_id, subject_id).await {
            self.audit_denied(subject_id, file_id, &e);
            return Err(e);
        }
        self.reveal.forget_file(file_id);
        audit_log!(
            &self.data_dir,
            AuditEventType::FileDeleted,
            subject_id,
            "file",
            file_id
        );
        Ok(())
    }

    pub fn get_file(&self, subject_id: &str, file_id: &str) -> Result<FileRecord, CustodyError> {
        self.holder_record(subject_id, file_id)
    }

    pub fn list_owned(&self, owner_id: &str) -> Result<Vec<FileRecord>, CustodyError> {
        self.store.list_owned(owner_id)
    }

    pub fn list_received(&self, recipient_id: &str) -> Result<Vec<FileRecord>, CustodyError> {
        self.store.list_received(recipient_id)
    }

    // =========================================================================
    // Disclosure
    // =========================================================================

    pub async fn unlock(
        &self,
        subject_id: &str,
        credential: &Credential,
    ) -> Result<Unlocked, CustodyError> {
        if credential.is_empty() {
            return Err(CustodyError::InvalidRequest(
                "credential must not be empty".to_string(),
            ));
        }

        match self.gate.authenticate(subject_id, credential, None).await {
            Ok(unlocked) => {
                audit_log!(&self.data_dir, AuditEventType::GateUnlocked, subject_id);
                Ok(unlocked)
            }
            Err(e) => {
                let event_type = match e {
                    CustodyError::AuthFailure => Some(AuditEventType::AuthFailure),
                    CustodyError::LockedOut { .. } => Some(AuditEventType::LockedOut),
                    _ => None,
                };
                if let Some(event_type) = event_type {
                    self.audit(
                        AuditEvent::new(event_type)
                            .with_subject(subject_id)
                            .failed(e.error_code()),
                    );
                }
                Err(e)
            }
        }
    }

    pub fn lock(&self, subject_id: &str) -> bool {
        let was_unlocked = self.reveal.lock(subject_id);
        if was_unlocked {
            audit_log!(&self.data_dir, AuditEventType::GateLocked, subject_id);
        }
        was_unlocked
    }

    pub fn reveal_key(&self, subject_id: &str, file_id: &str) -> Result<FileKey, CustodyError> {
        match self.reveal.reveal(subject_id, file_id) {
            Ok(key) => {
                audit_log!(
                    &self.data_dir,
                    AuditEventType::KeyRevealed,
                    subject_id,
                    "file",
                    file_id
                );
                Ok(key)
            }
            Err(e) => {
                self.audit_denied(subject_id, file_id, &e);
                Err(e)
            }
        }
    }

    pub fn hide_key(&self, subject_id: &str, file_id: &str) -> bool {
        let hidden = self.reveal.hide(subject_id, file_id);
        if hidden {
            audit_log!(
                &self.data_dir,
                AuditEventType::KeyHidden,
                subject_id,
                "file",
                file_id
            );
        }
        hidden
    }

    pub fn status(&self, subject_id: &str) -> DisclosureStatus {
        DisclosureStatus {
            gate: self.gate.status(subject_id),
            revealed_file_ids: self.reveal.revealed_file_ids(subject_id),
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Expire sessions, evict old attempts and finish interrupted deletes.
    pub async fn sweep(&self) -> Result<SweepReport, CustodyError> {
        let expired_subjects = self.reveal.expire();
        for subject_id in &expired_subjects {
            audit_log!(&self.data_dir, AuditEventType::GateExpired, subject_id.as_str());
        }

        let evicted_attempts = self.gate.evict_attempts();
        let completed_deletes = self.store.resume_pending_deletes().await?;

        Ok(SweepReport {
            expired_subjects,
            evicted_attempts,
            completed_deletes,
        })
    }

    pub fn health_check(&self) -> Result<(), CustodyError> {
        Ok(self.data_dir.health_check()?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn holder_record(&self, subject_id: &str, file_id: &str) -> Result<FileRecord, CustodyError> {
        self.store.lookup_for(file_id, subject_id).inspect_err(|e| {
            self.audit_denied(subject_id, file_id, e);
        })
    }

    async fn fetch_payload(&self, record: &FileRecord) -> Result<Vec<u8>, CustodyError> {
        match self.objects.get(&record.storage_locator).await {
            Ok(bytes) => Ok(bytes),
            Err(ObjectStoreError::NotFound(_)) => {
                // Deleted concurrently, or removed behind our back.
                match self.store.get_record(&record.file_id)? {
                    Some(current) if current.is_active() => {
                        tracing::warn!(file_id = %record.file_id, "Stored payload is missing");
                        Err(CustodyError::TamperDetected)
                    }
                    _ => Err(CustodyError::NotFound),
                }
            }
            Err(e) => Err(CustodyError::StorageUnavailable(e.to_string())),
        }
    }

    async fn discard_blob(&self, locator: &str) {
        if let Err(e) = self.objects.delete(locator).await {
            tracing::error!(locator = %locator, error = %e, "Failed to discard orphaned blob");
        }
    }

    fn audit(&self, event: AuditEvent) {
        AuditRepository::new(&self.data_dir).record(event);
    }

    fn audit_share(&self, owner_id: &str, record: &FileRecord) {
        self.audit(
            AuditEvent::new(AuditEventType::FileShared)
                .with_subject(owner_id)
                .with_resource("file", &record.file_id)
                .with_details(serde_json::json!({
                    "recipient_id": record.recipient_id,
                    "revision": record.revision,
                })),
        );
    }

    fn audit_tamper(&self, subject_id: &str, file_id: &str) {
        self.audit(
            AuditEvent::new(AuditEventType::TamperDetected)
                .with_subject(subject_id)
                .with_resource("file", file_id)
                .failed(CustodyError::TamperDetected.error_code()),
        );
    }

    fn audit_denied(&self, subject_id: &str, file_id: &str, err: &CustodyError) {
        if matches!(err, CustodyError::Forbidden | CustodyError::NotOwner) {
            self.audit(
                AuditEvent::new(AuditEventType::PermissionDenied)
                    .with_subject(subject_id)
                    .with_resource("file", file_id)
                    .failed(err.error_code()),
            );
        }
    }
}
