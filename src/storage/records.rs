// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File record database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `file_records`: file_id → serialized FileRecord (JSON bytes)

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::StorageResult;
use crate::crypto::WrappedKey;
use crate::integrity::ContentHash;

/// Primary table: file_id → serialized FileRecord (JSON bytes).
const FILE_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("file_records");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    /// Storage delete in flight. Readers still see the record; a restart
    /// finishes the delete.
    DeletePending,
}

/// Custody metadata for one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    pub owner_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    /// SHA-256 of the stored ciphertext.
    pub content_hash: ContentHash,
    /// Owner's envelope, fixed at registration.
    pub wrapped_key: WrappedKey,
    /// Envelope re-wrapped for `recipient_id`; replaced on every share.
    #[serde(default)]
    pub recipient_wrapped_key: Option<WrappedKey>,
    pub storage_locator: String,
    pub created_at: DateTime<Utc>,
    /// Incremented on every share.
    pub revision: u32,
    pub status: RecordStatus,
}

impl FileRecord {
    pub fn is_owner(&self, subject_id: &str) -> bool {
        self.owner_id == subject_id
    }

    pub fn is_recipient(&self, subject_id: &str) -> bool {
        self.recipient_id.as_deref() == Some(subject_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// The envelope a subject discloses with, if they hold one.
    pub fn envelope_for(&self, subject_id: &str) -> Option<&WrappedKey> {
        if self.is_owner(subject_id) {
            Some(&self.wrapped_key)
        } else if self.is_recipient(subject_id) {
            self.recipient_wrapped_key.as_ref()
        } else {
            None
        }
    }
}

/// Embedded ACID file record database.
pub struct RecordDatabase {
    db: Database,
}

impl RecordDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILE_RECORDS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a record unless its id is taken. Returns false on conflict.
    pub fn insert_new(&self, record: &FileRecord) -> StorageResult<bool> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(FILE_RECORDS)?;
            if table.get(record.file_id.as_str())?.is_some() {
                false
            } else {
                table.insert(record.file_id.as_str(), json.as_slice())?;
                true
            }
        };

        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Overwrite an existing record.
    pub fn replace(&self, record: &FileRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(FILE_RECORDS)?;
            table.insert(record.file_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, file_id: &str) -> StorageResult<Option<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILE_RECORDS)?;
        match table.get(file_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove(&self, file_id: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(FILE_RECORDS)?;
            let removed = table.remove(file_id)?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// All records matching a predicate, newest first.
    pub fn scan<F>(&self, mut predicate: F) -> StorageResult<Vec<FileRecord>>
    where
        F: FnMut(&FileRecord) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILE_RECORDS)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: FileRecord = serde_json::from_slice(value.value())?;
            if predicate(&record) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
