// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::crypto::{AuthFailure, WrapError};
use crate::storage::StorageError;

/// Caller-facing failure kinds of the custody core.
///
/// Every variant is reported as itself; callers render kind-specific messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("authentication failed")]
    AuthFailure,

    #[error("too many failed attempts; retry in {retry_after_secs}s")]
    LockedOut { retry_after_secs: u64 },

    #[error("disclosure is locked; re-authenticate to continue")]
    Locked,

    #[error("access to this file is not permitted")]
    Forbidden,

    #[error("only the file owner may perform this operation")]
    NotOwner,

    #[error("file not found")]
    NotFound,

    #[error("file already exists")]
    DuplicateFile,

    #[error("stored file failed its integrity check")]
    TamperDetected,

    #[error("file could not be decrypted")]
    DecryptionFailed,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("authentication service unavailable: {0}")]
    AuthUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CustodyError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            CustodyError::AuthFailure => "auth_failure",
            CustodyError::LockedOut { .. } => "locked_out",
            CustodyError::Locked => "locked",
            CustodyError::Forbidden => "forbidden",
            CustodyError::NotOwner => "not_owner",
            CustodyError::NotFound => "not_found",
            CustodyError::DuplicateFile => "duplicate_file",
            CustodyError::TamperDetected => "tamper_detected",
            CustodyError::DecryptionFailed => "decryption_failed",
            CustodyError::StorageUnavailable(_) => "storage_unavailable",
            CustodyError::AuthUnavailable(_) => "auth_unavailable",
            CustodyError::InvalidRequest(_) => "invalid_request",
            CustodyError::Internal(_) => "internal_error",
        }
    }

    /// Only failures of external dependencies are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CustodyError::StorageUnavailable(_) | CustodyError::AuthUnavailable(_)
        )
    }
}

impl From<AuthFailure> for CustodyError {
    fn from(_: AuthFailure) -> Self {
        CustodyError::AuthFailure
    }
}

impl From<WrapError> for CustodyError {
    fn from(err: WrapError) -> Self {
        CustodyError::Internal(err.to_string())
    }
}

impl From<StorageError> for CustodyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Json(_) | StorageError::Corrupt(_) | StorageError::IntegrityViolation(_) => {
                CustodyError::Internal(err.to_string())
            }
            other => CustodyError::StorageUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<CustodyError> for ApiError {
    fn from(err: CustodyError) -> Self {
        let status = match &err {
            CustodyError::AuthFailure => StatusCode::UNAUTHORIZED,
            CustodyError::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            CustodyError::Locked => StatusCode::LOCKED,
            CustodyError::Forbidden | CustodyError::NotOwner => StatusCode::FORBIDDEN,
            CustodyError::NotFound => StatusCode::NOT_FOUND,
            CustodyError::DuplicateFile => StatusCode::CONFLICT,
            CustodyError::TamperDetected | CustodyError::DecryptionFailed => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CustodyError::StorageUnavailable(_) | CustodyError::AuthUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CustodyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CustodyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Dependency and internal details stay in the server log.
        let message = match &err {
            CustodyError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal custody error");
                "internal error".to_string()
            }
            CustodyError::StorageUnavailable(detail) => {
                tracing::warn!(error = %detail, "Storage unavailable");
                "storage unavailable".to_string()
            }
            CustodyError::AuthUnavailable(detail) => {
                tracing::warn!(error = %detail, "Authentication service unavailable");
                "authentication service unavailable".to_string()
            }
            other => other.to_string(),
        };

        Self::new(status, err.error_code(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}
