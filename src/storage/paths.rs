// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the data directory layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent state.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Record Database ==========

    /// Directory holding embedded databases.
    pub fn db_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    /// Path to the file record database.
    pub fn records_db(&self) -> PathBuf {
        self.db_dir().join("records.redb")
    }

    // ========== Object Storage ==========

    /// Directory backing the filesystem object store.
    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    // ========== Keyring ==========

    /// Directory containing keyring material.
    pub fn keyring_dir(&self) -> PathBuf {
        self.root.join("keyring")
    }

    /// Path to the keyring master key.
    pub fn master_key(&self) -> PathBuf {
        self.keyring_dir().join("master.key")
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.records_db(),
            PathBuf::from("/tmp/test-data/db/records.redb")
        );
    }

    #[test]
    fn keyring_and_object_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.objects_dir(), PathBuf::from("/data/objects"));
        assert_eq!(paths.keyring_dir(), PathBuf::from("/data/keyring"));
        assert_eq!(
            paths.master_key(),
            PathBuf::from("/data/keyring/master.key")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-10-19"),
            PathBuf::from("/data/audit/2026-10-19/events.jsonl")
        );
    }
}
