// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. Wrapped keys never leave the
//! server; a file key appears only in a reveal response to an unlocked holder.
//!
//! ## Model Categories
//!
//! - **Files**: upload, listing, sharing, download and verification
//! - **Disclosure**: gate unlock/lock, key reveal/hide and status

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::custody::{DisclosureStatus, DownloadedFile};
use crate::gate::GatePhase;
use crate::storage::FileRecord;

// =============================================================================
// File Models
// =============================================================================

/// Upload a file. Content is base64 encoded.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UploadFileRequest {
    pub file_name: String,
    /// File contents, standard base64 with padding.
    pub content_base64: String,
    /// Route the file to this user instead of keeping it personal.
    #[serde(default)]
    pub recipient_username: Option<String>,
}

/// A file's custody metadata as seen by one of its holders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FileResponse {
    pub file_id: String,
    pub file_name: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    /// Lowercase hex SHA-256 of the stored ciphertext.
    pub content_hash: String,
    pub revision: u32,
    pub created_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            file_id: record.file_id,
            file_name: record.file_name,
            owner_id: record.owner_id,
            recipient_id: record.recipient_id,
            content_hash: record.content_hash.as_str().to_string(),
            revision: record.revision,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
}

impl From<Vec<FileRecord>> for FileListResponse {
    fn from(records: Vec<FileRecord>) -> Self {
        Self {
            files: records.into_iter().map(FileResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShareFileRequest {
    pub username: String,
}

/// Decrypted file contents.
#[derive(Serialize, ToSchema)]
pub struct DownloadResponse {
    pub file_id: String,
    pub file_name: String,
    pub content_base64: String,
}

impl From<DownloadedFile> for DownloadResponse {
    fn from(file: DownloadedFile) -> Self {
        Self {
            content_base64: Base64::encode_string(file.content.as_slice()),
            file_id: file.file_id,
            file_name: file.file_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub file_id: String,
    pub content_hash: String,
    pub verified: bool,
}

// =============================================================================
// Disclosure Models
// =============================================================================

#[derive(Deserialize, ToSchema)]
pub struct UnlockRequest {
    /// The caller's account password.
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnlockResponse {
    pub phase: GatePhase,
    pub expires_in_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LockResponse {
    /// Whether an unlock was active.
    pub was_unlocked: bool,
}

/// A revealed file key, base64 encoded.
#[derive(Serialize, ToSchema)]
pub struct RevealResponse {
    pub file_id: String,
    pub file_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HideResponse {
    pub file_id: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DisclosureStatusResponse {
    pub phase: GatePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_remaining_secs: Option<u64>,
    pub revealed_file_ids: Vec<String>,
}

impl From<DisclosureStatus> for DisclosureStatusResponse {
    fn from(status: DisclosureStatus) -> Self {
        Self {
            phase: status.gate.phase,
            unlock_remaining_secs: status.gate.unlock_remaining.map(|d| d.as_secs()),
            lockout_remaining_secs: status
                .gate
                .lockout_remaining
                .map(|d| d.as_secs_f64().ceil() as u64),
            revealed_file_ids: status.revealed_file_ids.into_iter().collect(),
        }
    }
}
