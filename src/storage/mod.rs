// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the custody service, all under one data directory.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   db/
//!     records.redb         # File records (wrapped keys, hashes, holders)
//!   objects/               # Filesystem object store (ciphertext only)
//!     secure_vault_files/{file_id}
//!     sharedfiles/{file_id}
//!   keyring/
//!     master.key           # Keyring master key
//!   audit/
//!     {date}/events.jsonl  # Daily audit logs
//! ```
//!
//! ## Important Notes
//!
//! - Only wrapped keys are ever persisted; plaintext file keys never are
//! - Object storage receives ciphertext and opaque locators only

pub mod audit;
pub mod data_dir;
pub mod key_store;
pub mod ownership;
pub mod paths;
pub mod records;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use data_dir::{DataDir, StorageError, StorageResult};
pub use key_store::{FileKeyStore, NewFileRecord};
pub use ownership::{AccessCheck, AccessEnforcer, HeldResource};
pub use paths::StoragePaths;
pub use records::{FileRecord, RecordDatabase, RecordStatus};
