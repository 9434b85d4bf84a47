// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! File lifecycle events, key disclosures, gate transitions and access
//! denials are appended to a daily JSONL file in the data directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DataDir, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // File events
    FileRegistered,
    FileShared,
    FileDeleted,
    FileDownloaded,

    // Disclosure events
    KeyRevealed,
    KeyHidden,

    // Gate events
    GateUnlocked,
    GateLocked,
    GateExpired,
    AuthFailure,
    LockedOut,

    // Integrity events
    TamperDetected,

    // Access events
    PermissionDenied,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Subject who triggered the event (if known).
    pub subject_id: Option<String>,
    /// Resource affected (file_id).
    pub resource_id: Option<String>,
    /// Resource type (file, session).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error code if the operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            subject_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with an error code.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a DataDir,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a DataDir) -> Self {
        Self { storage }
    }

    /// Append an event to the day's JSONL file.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.storage.append_raw(&path, &line)
    }

    /// Log an event; a failure is reported but never propagated.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                event_type = ?event.event_type,
                error = %e,
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;

        let content_str = String::from_utf8(content)
            .map_err(|e| StorageError::Corrupt(format!("invalid UTF-8 in audit log: {e}")))?;

        let mut events = Vec::new();
        for line in content_str.lines() {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(line)?);
        }

        Ok(events)
    }

    /// Events touching one resource on a given date.
    pub fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let events = self.read_events(date)?;
        Ok(events
            .into_iter()
            .filter(|e| {
                e.resource_type.as_deref() == Some(resource_type)
                    && e.resource_id.as_deref() == Some(resource_id)
            })
            .collect())
    }
}

/// Helper macro for logging audit events.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $subject:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        repo.record($crate::storage::AuditEvent::new($event_type).with_subject($subject));
    }};
    ($storage:expr, $event_type:expr, $subject:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        repo.record(
            $crate::storage::AuditEvent::new($event_type)
                .with_subject($subject)
                .with_resource($resource_type, $resource_id),
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DataDir) {
        let temp = TempDir::new().unwrap();
        let mut storage = DataDir::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::FileRegistered)
            .with_subject("user_123")
            .with_resource("file", "file_abc");

        assert_eq!(event.event_type, AuditEventType::FileRegistered);
        assert_eq!(event.subject_id, Some("user_123".to_string()));
        assert_eq!(event.resource_type, Some("file".to_string()));
        assert_eq!(event.resource_id, Some("file_abc".to_string()));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::PermissionDenied)
            .with_subject("user_123")
            .failed("forbidden");

        assert!(!event.success);
        assert_eq!(event.error, Some("forbidden".to_string()));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(
            &AuditEvent::new(AuditEventType::FileRegistered)
                .with_subject("user_1")
                .with_resource("file", "f1"),
        )
        .unwrap();
        repo.log(&AuditEvent::new(AuditEventType::GateUnlocked).with_subject("user_2"))
            .unwrap();

        let events = repo.read_events(&today()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::FileRegistered);
        assert_eq!(events[1].event_type, AuditEventType::GateUnlocked);
    }

    #[test]
    fn macro_records_events() {
        let (_temp, storage) = setup();

        audit_log!(&storage, AuditEventType::GateLocked, "user_1");
        audit_log!(&storage, AuditEventType::KeyRevealed, "user_1", "file", "f9");

        let repo = AuditRepository::new(&storage);
        let events = repo.search_by_resource("file", "f9", &today()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::KeyRevealed);
        assert_eq!(repo.read_events(&today()).unwrap().len(), 2);
    }

    #[test]
    fn record_swallows_write_failures() {
        let storage = DataDir::new(StoragePaths::new("/tmp/never-init"));
        AuditRepository::new(&storage).record(AuditEvent::new(AuditEventType::GateLocked));
    }
}
