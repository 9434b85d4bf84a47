// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File key store.
//!
//! Owns every [`FileRecord`]: the wrapped per-file key, the anchored content
//! hash and who may hold the file. Mutations of one file are serialized by a
//! per-file async lock that is held across the object storage call, so a
//! share racing a delete observes `NotFound` rather than re-wrapping a key for
//! a blob that is gone.
//!
//! ## Delete Protocol
//!
//! ```text
//! mark delete_pending -> object store delete -> remove record
//!                              |
//!                              +-- failure -> restore active, StorageUnavailable
//! ```
//!
//! Readers keep seeing a pending record until it is removed, so a failed
//! delete is never observable. The status only marks work for
//! [`FileKeyStore::resume_pending_deletes`] if the process stops between the
//! two steps.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::ownership::AccessCheck;
use super::records::{FileRecord, RecordDatabase, RecordStatus};
use crate::crypto::{unwrap, wrap, FileKey, HolderSecret};
use crate::error::CustodyError;
use crate::integrity::ContentHash;
use crate::providers::{DirectoryError, ObjectStore, ObjectStoreError, RecipientResolver};

/// Metadata for a file being registered.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub file_id: String,
    pub file_name: String,
    pub owner_id: String,
    pub content_hash: ContentHash,
    pub storage_locator: String,
}

#[derive(Default)]
struct FileLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileLocks {
    async fn acquire(&self, file_id: &str) -> FileLockGuard<'_> {
        let lock = self.locks.entry(file_id.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        FileLockGuard {
            locks: self,
            file_id: file_id.to_string(),
            guard: Some(guard),
        }
    }
}

struct FileLockGuard<'a> {
    locks: &'a FileLocks,
    file_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map holds the lock once nobody is waiting on it.
        self.locks
            .locks
            .remove_if(&self.file_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Persistent mapping from file id to wrapped key and custody metadata.
pub struct FileKeyStore {
    records: RecordDatabase,
    objects: Arc<dyn ObjectStore>,
    resolver: Arc<dyn RecipientResolver>,
    locks: FileLocks,
}

impl FileKeyStore {
    pub fn new(
        records: RecordDatabase,
        objects: Arc<dyn ObjectStore>,
        resolver: Arc<dyn RecipientResolver>,
    ) -> Self {
        Self {
            records,
            objects,
            resolver,
            locks: FileLocks::default(),
        }
    }

    /// Wrap the file key under the owner's secret and persist a new record.
    pub async fn register(
        &self,
        new: NewFileRecord,
        key: &FileKey,
        owner_secret: &HolderSecret,
    ) -> Result<FileRecord, CustodyError> {
        if new.file_id.trim().is_empty() || new.owner_id.trim().is_empty() {
            return Err(CustodyError::InvalidRequest(
                "file id and owner id are required".to_string(),
            ));
        }

        let _lock = self.locks.acquire(&new.file_id).await;

        let record = FileRecord {
            file_id: new.file_id,
            file_name: new.file_name,
            owner_id: new.owner_id,
            recipient_id: None,
            content_hash: new.content_hash,
            wrapped_key: wrap(key, owner_secret)?,
            recipient_wrapped_key: None,
            storage_locator: new.storage_locator,
            created_at: Utc::now(),
            revision: 0,
            status: RecordStatus::Active,
        };

        if !self.records.insert_new(&record)? {
            return Err(CustodyError::DuplicateFile);
        }

        tracing::info!(
            file_id = %record.file_id,
            owner_id = %record.owner_id,
            "Registered file"
        );
        Ok(record)
    }

    /// Re-wrap the file key for a recipient.
    ///
    /// The key is recovered from the owner's envelope with `owner_secret`, so a
    /// wrong owner secret is `AuthFailure`. The owner's envelope is left as
    /// registered; only the recipient envelope is replaced.
    pub async fn share(
        &self,
        file_id: &str,
        requester_id: &str,
        recipient_id: &str,
        owner_secret: &HolderSecret,
        recipient_secret: &HolderSecret,
    ) -> Result<FileRecord, CustodyError> {
        let _lock = self.locks.acquire(file_id).await;

        let record = self.get_record(file_id)?.owner_access(requester_id)?;
        if recipient_id == record.owner_id {
            return Err(CustodyError::InvalidRequest(
                "cannot share a file with its owner".to_string(),
            ));
        }

        let key = unwrap(&record.wrapped_key, owner_secret)?;

        let shared = FileRecord {
            recipient_id: Some(recipient_id.to_string()),
            recipient_wrapped_key: Some(wrap(&key, recipient_secret)?),
            revision: record.revision + 1,
            ..record
        };
        self.records.replace(&shared)?;

        tracing::info!(
            file_id = %file_id,
            recipient_id = %recipient_id,
            revision = shared.revision,
            "Shared file"
        );
        Ok(shared)
    }

    /// Resolve a username, then share with the resolved account.
    pub async fn share_with_username<F>(
        &self,
        file_id: &str,
        requester_id: &str,
        username: &str,
        owner_secret: &HolderSecret,
        recipient_secret_for: F,
    ) -> Result<FileRecord, CustodyError>
    where
        F: FnOnce(&str) -> Result<HolderSecret, CustodyError>,
    {
        let recipient_id = self.resolve_recipient(username).await?;
        let recipient_secret = recipient_secret_for(&recipient_id)?;
        self.share(
            file_id,
            requester_id,
            &recipient_id,
            owner_secret,
            &recipient_secret,
        )
        .await
    }

    pub async fn resolve_recipient(&self, username: &str) -> Result<String, CustodyError> {
        self.resolver
            .resolve_username(username)
            .await
            .map_err(|e| match e {
                DirectoryError::NotFound(name) => {
                    CustodyError::InvalidRequest(format!("unknown recipient username: {name}"))
                }
                other => CustodyError::Internal(other.to_string()),
            })
    }

    /// Delete the stored blob and the record, or neither.
    pub async fn delete(&self, file_id: &str, requester_id: &str) -> Result<(), CustodyError> {
        let _lock = self.locks.acquire(file_id).await;

        let record = self.get_record(file_id)?.holder_access(requester_id)?;

        let pending = FileRecord {
            status: RecordStatus::DeletePending,
            ..record.clone()
        };
        self.records.replace(&pending)?;

        match self.objects.delete(&record.storage_locator).await {
            Ok(()) | Err(ObjectStoreError::NotFound(_)) => {
                self.records.remove(file_id)?;
                tracing::info!(
                    file_id = %file_id,
                    requester_id = %requester_id,
                    "Deleted file"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(file_id = %file_id, error = %e, "Storage delete failed");
                if let Err(restore) = self.records.replace(&record) {
                    // Left pending; the next resume pass deletes it.
                    tracing::error!(
                        file_id = %file_id,
                        error = %restore,
                        "Failed to restore record after storage delete failure"
                    );
                    return Err(CustodyError::Internal(format!(
                        "delete of {file_id} left pending: {restore}"
                    )));
                }
                Err(CustodyError::StorageUnavailable(e.to_string()))
            }
        }
    }

    /// `NotFound` if absent, `Forbidden` unless the requester holds the file.
    pub fn lookup_for(&self, file_id: &str, requester_id: &str) -> Result<FileRecord, CustodyError> {
        self.get_record(file_id)?.holder_access(requester_id)
    }

    /// Unwrap the key from the requester's own envelope.
    pub fn unwrap_for(
        &self,
        file_id: &str,
        requester_id: &str,
        secret: &HolderSecret,
    ) -> Result<FileKey, CustodyError> {
        let record = self.lookup_for(file_id, requester_id)?;
        let envelope = record
            .envelope_for(requester_id)
            .ok_or(CustodyError::Forbidden)?;
        Ok(unwrap(envelope, secret)?)
    }

    /// Record without an access check.
    pub fn get_record(&self, file_id: &str) -> Result<Option<FileRecord>, CustodyError> {
        Ok(self.records.get(file_id)?)
    }

    pub fn list_owned(&self, owner_id: &str) -> Result<Vec<FileRecord>, CustodyError> {
        Ok(self.records.scan(|r| r.is_owner(owner_id))?)
    }

    pub fn list_received(&self, recipient_id: &str) -> Result<Vec<FileRecord>, CustodyError> {
        Ok(self.records.scan(|r| r.is_recipient(recipient_id))?)
    }

    /// Finish deletes that were interrupted. Returns how many completed.
    pub async fn resume_pending_deletes(&self) -> Result<usize, CustodyError> {
        let pending = self
            .records
            .scan(|r| r.status == RecordStatus::DeletePending)?;

        let mut completed = 0;
        for candidate in pending {
            let _lock = self.locks.acquire(&candidate.file_id).await;

            let Some(record) = self.records.get(&candidate.file_id)? else {
                continue;
            };
            if record.is_active() {
                continue;
            }

            match self.objects.delete(&record.storage_locator).await {
                Ok(()) | Err(ObjectStoreError::NotFound(_)) => {
                    self.records.remove(&record.file_id)?;
                    completed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        file_id = %record.file_id,
                        error = %e,
                        "Pending delete still failing"
                    );
                }
            }
        }

        if completed > 0 {
            tracing::info!(completed, "Completed pending deletes");
        }
        Ok(completed)
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.locks.len()
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &RecordDatabase {
        &self.records
    }
}
