// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::SessionTokens;
use crate::custody::CustodyService;

#[derive(Clone)]
pub struct AppState {
    pub custody: Arc<CustodyService>,
    pub tokens: Arc<SessionTokens>,
}

impl AppState {
    pub fn new(custody: Arc<CustodyService>, tokens: SessionTokens) -> Self {
        Self {
            custody,
            tokens: Arc::new(tokens),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::crypto::Keyring;
    use crate::gate::{DisclosureGate, GatePolicy};
    use crate::providers::{MemoryCredentialVerifier, MemoryObjectStore, StaticDirectory};
    use crate::storage::{DataDir, FileKeyStore, RecordDatabase, StoragePaths};
    use tempfile::TempDir;

    pub const TOKEN_SECRET: &[u8] = b"test-session-secret-0123456789ab";

    pub struct TestHarness {
        pub state: AppState,
        pub objects: Arc<MemoryObjectStore>,
        pub temp: TempDir,
    }

    /// Accounts `alice` and `bob`, each with password `<name>-pw`.
    pub fn test_harness() -> TestHarness {
        let temp = TempDir::new().unwrap();
        let mut data_dir = DataDir::new(StoragePaths::new(temp.path()));
        data_dir.initialize().unwrap();

        let objects = Arc::new(MemoryObjectStore::new());
        let directory = StaticDirectory::new()
            .with_user("alice", "alice")
            .with_user("bob", "bob");
        let store = Arc::new(FileKeyStore::new(
            RecordDatabase::open(&data_dir.paths().records_db()).unwrap(),
            objects.clone(),
            Arc::new(directory),
        ));
        let verifier = MemoryCredentialVerifier::new()
            .with_account("alice", "alice-pw")
            .with_account("bob", "bob-pw");
        let gate = Arc::new(DisclosureGate::new(
            Arc::new(verifier),
            GatePolicy::default(),
        ));
        let custody = Arc::new(CustodyService::new(
            data_dir,
            Arc::new(Keyring::generate().unwrap()),
            store,
            objects.clone(),
            gate,
            16,
        ));

        TestHarness {
            state: AppState::new(custody, SessionTokens::new(TOKEN_SECRET)),
            objects,
            temp,
        }
    }

    pub fn test_state() -> (AppState, TempDir) {
        let harness = test_harness();
        (harness.state, harness.temp)
    }
}
