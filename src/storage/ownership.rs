// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access enforcement for file records.
//!
//! Every record read or mutation passes through one of these checks. Holders
//! (owner or recipient) may read and delete; only the owner may share.

use crate::error::CustodyError;

use super::FileRecord;

/// Trait for resources with an owner and at most one recipient.
pub trait HeldResource {
    fn owner_id(&self) -> &str;

    fn recipient_id(&self) -> Option<&str>;
}

impl HeldResource for FileRecord {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn recipient_id(&self) -> Option<&str> {
        self.recipient_id.as_deref()
    }
}

/// Trait for enforcing access on a loaded resource.
pub trait AccessEnforcer {
    /// `Forbidden` unless the subject is the owner or the recipient.
    fn verify_holder(&self, subject_id: &str) -> Result<(), CustodyError>;

    /// `NotOwner` unless the subject is the owner.
    fn verify_owner(&self, subject_id: &str) -> Result<(), CustodyError>;
}

impl<T: HeldResource> AccessEnforcer for T {
    fn verify_holder(&self, subject_id: &str) -> Result<(), CustodyError> {
        if self.owner_id() == subject_id || self.recipient_id() == Some(subject_id) {
            Ok(())
        } else {
            Err(CustodyError::Forbidden)
        }
    }

    fn verify_owner(&self, subject_id: &str) -> Result<(), CustodyError> {
        if self.owner_id() == subject_id {
            Ok(())
        } else {
            Err(CustodyError::NotOwner)
        }
    }
}

/// Extension trait for checking access on an optional lookup result.
pub trait AccessCheck<T> {
    /// `NotFound` if absent, `Forbidden` if the subject holds no envelope.
    fn holder_access(self, subject_id: &str) -> Result<T, CustodyError>;

    /// `NotFound` if absent, `NotOwner` if the subject is not the owner.
    fn owner_access(self, subject_id: &str) -> Result<T, CustodyError>;
}

impl<T: HeldResource> AccessCheck<T> for Option<T> {
    fn holder_access(self, subject_id: &str) -> Result<T, CustodyError> {
        let resource = self.ok_or(CustodyError::NotFound)?;
        resource.verify_holder(subject_id)?;
        Ok(resource)
    }

    fn owner_access(self, subject_id: &str) -> Result<T, CustodyError> {
        let resource = self.ok_or(CustodyError::NotFound)?;
        resource.verify_owner(subject_id)?;
        Ok(resource)
    }
}
