// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators consumed by the custody core.
//!
//! The core only sees the narrow traits below:
//!
//! - [`CredentialVerifier`] answers "is this the subject's credential?"
//! - [`ObjectStore`] holds opaque ciphertext under opaque locators
//! - [`RecipientResolver`] maps a username to an account id for directed sharing
//!
//! Concrete backends live in the submodules, each with an in-memory variant
//! for tests and local development.

pub mod credentials;
pub mod directory;
pub mod object_store;

use async_trait::async_trait;

pub use credentials::{
    Credential, CredentialError, LoginCredentialVerifier, MemoryCredentialVerifier,
};
pub use directory::{normalize_username, DirectoryError, StaticDirectory};
pub use object_store::{FsObjectStore, MemoryObjectStore, ObjectStoreError};

/// Authentication collaborator. The custody core never stores credentials.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(false)` means the credential was checked and rejected; `Err` means
    /// no verdict could be obtained.
    async fn verify_credential(
        &self,
        subject_id: &str,
        credential: &Credential,
    ) -> Result<bool, CredentialError>;
}

/// Object storage for encrypted payloads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store ciphertext and return the locator it can be fetched under.
    async fn put(&self, locator: &str, ciphertext: Vec<u8>) -> Result<String, ObjectStoreError>;

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ObjectStoreError>;

    async fn delete(&self, locator: &str) -> Result<(), ObjectStoreError>;
}

/// Directed-sharing resolver.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    async fn resolve_username(&self, username: &str) -> Result<String, DirectoryError>;
}
