// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Object storage backends for encrypted payloads.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::ObjectStore;
use crate::storage::{DataDir, StorageError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Reject anything that could escape the store root.
fn validate_locator(locator: &str) -> Result<(), ObjectStoreError> {
    let path = Path::new(locator);
    let only_normal = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));

    if locator.is_empty() || locator.contains('\\') || !only_normal {
        return Err(ObjectStoreError::InvalidLocator(locator.to_string()));
    }
    Ok(())
}

fn map_storage_error(locator: &str, err: StorageError) -> ObjectStoreError {
    match err {
        StorageError::Io(ref e) if e.kind() == io::ErrorKind::NotFound => {
            ObjectStoreError::NotFound(locator.to_string())
        }
        other => ObjectStoreError::Unavailable(other.to_string()),
    }
}

/// Object store under `<DATA_DIR>/objects`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    data_dir: DataDir,
}

impl FsObjectStore {
    pub fn new(data_dir: DataDir) -> Self {
        Self { data_dir }
    }

    fn object_path(&self, locator: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_locator(locator)?;
        Ok(self.data_dir.paths().objects_dir().join(locator))
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, ObjectStoreError>
    where
        T: Send + 'static,
        F: FnOnce(DataDir) -> Result<T, ObjectStoreError> + Send + 'static,
    {
        let data_dir = self.data_dir.clone();
        tokio::task::spawn_blocking(move || op(data_dir))
            .await
            .map_err(|e| ObjectStoreError::Unavailable(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, locator: &str, ciphertext: Vec<u8>) -> Result<String, ObjectStoreError> {
        let path = self.object_path(locator)?;
        let owned = locator.to_string();
        self.blocking(move |dir| {
            dir.write_raw(&path, &ciphertext)
                .map_err(|e| map_storage_error(&owned, e))?;
            Ok(owned)
        })
        .await
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.object_path(locator)?;
        let owned = locator.to_string();
        self.blocking(move |dir| dir.read_raw(&path).map_err(|e| map_storage_error(&owned, e)))
            .await
    }

    async fn delete(&self, locator: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(locator)?;
        let owned = locator.to_string();
        self.blocking(move |dir| dir.delete(&path).map_err(|e| map_storage_error(&owned, e)))
            .await
    }
}

/// In-memory store with failure injection, for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Flip one bit of a stored object. Returns false if absent or empty.
    pub fn corrupt(&self, locator: &str) -> bool {
        let Ok(mut objects) = self.objects.lock() else {
            return false;
        };
        match objects.get_mut(locator) {
            Some(bytes) if !bytes.is_empty() => {
                let last = bytes.len() - 1;
                bytes[last] ^= 0x01;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(locator))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, ObjectStoreError> {
        self.objects
            .lock()
            .map_err(|_| ObjectStoreError::Unavailable("object map poisoned".to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, locator: &str, ciphertext: Vec<u8>) -> Result<String, ObjectStoreError> {
        validate_locator(locator)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Unavailable("injected put failure".to_string()));
        }
        self.lock()?.insert(locator.to_string(), ciphertext);
        Ok(locator.to_string())
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ObjectStoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Unavailable("injected get failure".to_string()));
        }
        self.lock()?
            .get(locator)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(locator.to_string()))
    }

    async fn delete(&self, locator: &str) -> Result<(), ObjectStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Unavailable(
                "injected delete failure".to_string(),
            ));
        }
        self.lock()?
            .remove(locator)
            .map(|_| ())
            .ok_or_else(|| ObjectStoreError::NotFound(locator.to_string()))
    }
}
