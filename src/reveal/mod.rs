// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Reveal Session Manager
//!
//! Tracks which file keys each subject has revealed during the current
//! unlock. Every subject's reveals are bound to the gate epoch they were made
//! under; locking, expiry or a fresh unlock all leave the subject with an
//! empty reveal set.
//!
//! Revealed keys are cached (bounded LRU per subject) so revealing the same
//! file twice does not unwrap the persisted envelope again. Nothing here
//! survives a restart.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lru::LruCache;

use crate::crypto::{FileKey, Keyring};
use crate::error::CustodyError;
use crate::gate::DisclosureGate;
use crate::storage::FileKeyStore;

/// Default number of revealed keys kept per subject.
pub const DEFAULT_REVEAL_CAPACITY: usize = 64;

struct RevealState {
    epoch: u64,
    revealed: LruCache<String, FileKey>,
}

impl RevealState {
    fn new(epoch: u64, capacity: NonZeroUsize) -> Self {
        Self {
            epoch,
            revealed: LruCache::new(capacity),
        }
    }
}

pub struct RevealSessionManager {
    gate: Arc<DisclosureGate>,
    store: Arc<FileKeyStore>,
    keyring: Arc<Keyring>,
    capacity: NonZeroUsize,
    states: DashMap<String, RevealState>,
}

impl RevealSessionManager {
    pub fn new(
        gate: Arc<DisclosureGate>,
        store: Arc<FileKeyStore>,
        keyring: Arc<Keyring>,
        capacity: usize,
    ) -> Self {
        Self {
            gate,
            store,
            keyring,
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            states: DashMap::new(),
        }
    }

    /// Disclose a file key to an unlocked holder.
    pub fn reveal(&self, subject_id: &str, file_id: &str) -> Result<FileKey, CustodyError> {
        let unlocked = self.gate.require_unlocked(subject_id)?;

        // Access is re-checked even for cached keys; a re-share may have revoked it.
        self.store.lookup_for(file_id, subject_id)?;

        if let Some(mut state) = self.states.get_mut(subject_id) {
            if state.epoch == unlocked.epoch {
                if let Some(key) = state.revealed.get(file_id) {
                    return Ok(key.clone());
                }
            }
        }

        let secret = self.keyring.secret_for(subject_id)?;
        let key = self.store.unwrap_for(file_id, subject_id, &secret)?;

        // The session may have been locked or replaced while unwrapping. The
        // check runs under the entry guard that `lock` also takes.
        let entry = self.states.entry(subject_id.to_string());
        match self.gate.require_unlocked(subject_id) {
            Ok(current) if current.epoch == unlocked.epoch => {}
            _ => return Err(CustodyError::Locked),
        }

        let mut state =
            entry.or_insert_with(|| RevealState::new(unlocked.epoch, self.capacity));
        if state.epoch != unlocked.epoch {
            *state = RevealState::new(unlocked.epoch, self.capacity);
        }
        state.revealed.put(file_id.to_string(), key.clone());

        tracing::info!(subject_id = %subject_id, file_id = %file_id, "Key revealed");
        Ok(key)
    }

    /// Remove one file from the subject's reveal set. Returns whether it was there.
    /// Reveals left over from an expired or replaced unlock count as absent.
    pub fn hide(&self, subject_id: &str, file_id: &str) -> bool {
        let Ok(unlocked) = self.gate.require_unlocked(subject_id) else {
            self.states.remove(subject_id);
            return false;
        };

        match self.states.get_mut(subject_id) {
            Some(mut state) if state.epoch == unlocked.epoch => {
                state.revealed.pop(file_id).is_some()
            }
            _ => false,
        }
    }

    /// Lock the subject's gate and drop every reveal.
    pub fn lock(&self, subject_id: &str) -> bool {
        match self.states.entry(subject_id.to_string()) {
            Entry::Occupied(entry) => {
                let was_unlocked = self.gate.lock(subject_id);
                entry.remove();
                was_unlocked
            }
            Entry::Vacant(_entry) => self.gate.lock(subject_id),
        }
    }

    /// Currently revealed file ids; empty unless the reveals belong to the
    /// subject's active unlock.
    pub fn revealed_file_ids(&self, subject_id: &str) -> BTreeSet<String> {
        let Ok(unlocked) = self.gate.require_unlocked(subject_id) else {
            self.states.remove(subject_id);
            return BTreeSet::new();
        };

        match self.states.get(subject_id) {
            Some(state) if state.epoch == unlocked.epoch => state
                .revealed
                .iter()
                .map(|(file_id, _)| file_id.clone())
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    pub fn is_revealed(&self, subject_id: &str, file_id: &str) -> bool {
        self.revealed_file_ids(subject_id).contains(file_id)
    }

    /// Drop a deleted file from every subject's reveals.
    pub fn forget_file(&self, file_id: &str) {
        for mut state in self.states.iter_mut() {
            state.revealed.pop(file_id);
        }
    }

    /// Expire gate sessions and drop reveals that no longer have an active
    /// unlock. Returns the subjects whose sessions expired.
    pub fn expire(&self) -> Vec<String> {
        let expired = self.gate.expire_sessions();
        self.states.retain(|subject_id, state| {
            matches!(
                self.gate.require_unlocked(subject_id),
                Ok(unlocked) if unlocked.epoch == state.epoch
            )
        });
        expired
    }

    pub fn subject_count(&self) -> usize {
        self.states.len()
    }
}
