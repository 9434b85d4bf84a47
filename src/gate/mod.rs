// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Disclosure Gate
//!
//! Per-subject state machine that re-validates a credential before any key
//! or payload is disclosed.
//!
//! ```text
//! Locked ──authenticate──▶ Authenticating ──ok──▶ Unlocked
//!   ▲                            │                   │
//!   └──────── failure ───────────┘                   │
//!   └──────────────── ttl expiry or lock ────────────┘
//! ```
//!
//! ## Lockout
//!
//! After `max_failures` consecutive failures inside `window`, every further
//! attempt returns `LockedOut` for `cooldown` without reaching the
//! authentication service.
//!
//! ## Cancellation
//!
//! The credential check runs with no gate lock held and state is applied only
//! after it resolves. A cancelled or timed-out check leaves no attempt behind
//! and no phase change; `Authenticating` is reported through a drop guard.

pub mod attempts;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::error::CustodyError;
use crate::providers::{Credential, CredentialVerifier};

pub use attempts::{AttemptHistory, AttemptOutcome, DisclosureAttempt};

/// Lockout and session timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    pub max_failures: u32,
    pub window: Duration,
    pub cooldown: Duration,
    pub unlock_ttl: Duration,
    pub attempt_retention: Duration,
    pub auth_timeout: Duration,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: Duration::from_secs(300),
            cooldown: Duration::from_secs(900),
            unlock_ttl: Duration::from_secs(600),
            attempt_retention: Duration::from_secs(3600),
            auth_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    Locked,
    Authenticating,
    Unlocked,
}

/// Proof that a subject is unlocked, bound to one unlock epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unlocked {
    pub epoch: u64,
    pub expires_at: Instant,
}

/// Snapshot of a subject's gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateStatus {
    pub phase: GatePhase,
    pub unlock_remaining: Option<Duration>,
    pub lockout_remaining: Option<Duration>,
}

#[derive(Debug, Default)]
struct SubjectState {
    unlocked: Option<Unlocked>,
    in_flight: u32,
    locked_out_until: Option<Instant>,
    attempts: AttemptHistory,
}

impl SubjectState {
    fn active_unlock(&self, now: Instant) -> Option<Unlocked> {
        self.unlocked.filter(|u| u.expires_at > now)
    }

    fn lockout_remaining(&self, now: Instant) -> Option<Duration> {
        self.locked_out_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.unlocked.is_none()
            && self.in_flight == 0
            && self.lockout_remaining(now).is_none()
            && self.attempts.is_empty()
    }
}

/// Whole seconds, rounded up, never zero.
fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

/// Marks a subject `Authenticating` for as long as it lives.
struct InFlightGuard<'a> {
    subjects: &'a DashMap<String, SubjectState>,
    subject_id: &'a str,
}

impl<'a> InFlightGuard<'a> {
    fn enter(subjects: &'a DashMap<String, SubjectState>, subject_id: &'a str) -> Self {
        subjects.entry(subject_id.to_string()).or_default().in_flight += 1;
        Self {
            subjects,
            subject_id,
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.subjects.get_mut(self.subject_id) {
            state.in_flight = state.in_flight.saturating_sub(1);
        }
    }
}

pub struct DisclosureGate {
    verifier: Arc<dyn CredentialVerifier>,
    policy: GatePolicy,
    subjects: DashMap<String, SubjectState>,
    next_epoch: AtomicU64,
}

impl DisclosureGate {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, policy: GatePolicy) -> Self {
        Self {
            verifier,
            policy,
            subjects: DashMap::new(),
            next_epoch: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Check a credential and unlock the subject's disclosure context.
    pub async fn authenticate(
        &self,
        subject_id: &str,
        credential: &Credential,
        target_file_id: Option<&str>,
    ) -> Result<Unlocked, CustodyError> {
        if let Some(remaining) = self.check_lockout(subject_id, target_file_id) {
            return Err(CustodyError::LockedOut {
                retry_after_secs: ceil_secs(remaining),
            });
        }

        let _in_flight = InFlightGuard::enter(&self.subjects, subject_id);

        let verdict = tokio::time::timeout(
            self.policy.auth_timeout,
            self.verifier.verify_credential(subject_id, credential),
        )
        .await;

        let verified = match verdict {
            Ok(Ok(verified)) => verified,
            Ok(Err(e)) => {
                tracing::warn!(subject_id = %subject_id, error = %e, "Credential check failed");
                return Err(CustodyError::AuthUnavailable(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(subject_id = %subject_id, "Credential check timed out");
                return Err(CustodyError::AuthUnavailable(
                    "credential check timed out".to_string(),
                ));
            }
        };

        let now = Instant::now();
        let mut state = self.subjects.entry(subject_id.to_string()).or_default();

        if let Some(remaining) = state.lockout_remaining(now) {
            // A concurrent attempt tripped the lockout while this one was in flight.
            state.attempts.record(DisclosureAttempt::new(
                subject_id,
                target_file_id,
                now,
                AttemptOutcome::LockedOut,
            ));
            return Err(CustodyError::LockedOut {
                retry_after_secs: ceil_secs(remaining),
            });
        }

        if verified {
            state.attempts.record(DisclosureAttempt::new(
                subject_id,
                target_file_id,
                now,
                AttemptOutcome::Success,
            ));
            let unlocked = Unlocked {
                epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
                expires_at: now + self.policy.unlock_ttl,
            };
            state.unlocked = Some(unlocked);
            state.locked_out_until = None;

            tracing::info!(subject_id = %subject_id, epoch = unlocked.epoch, "Gate unlocked");
            return Ok(unlocked);
        }

        state.attempts.record(DisclosureAttempt::new(
            subject_id,
            target_file_id,
            now,
            AttemptOutcome::Failure,
        ));
        let failures = state.attempts.consecutive_failures(now, self.policy.window);
        if failures >= self.policy.max_failures as usize {
            state.locked_out_until = Some(now + self.policy.cooldown);
            state.unlocked = None;
            tracing::warn!(
                subject_id = %subject_id,
                failures,
                cooldown_secs = self.policy.cooldown.as_secs(),
                "Subject locked out"
            );
        } else {
            tracing::info!(subject_id = %subject_id, failures, "Credential rejected");
        }

        Err(CustodyError::AuthFailure)
    }

    /// Pure state check used before every reveal or download.
    pub fn require_unlocked(&self, subject_id: &str) -> Result<Unlocked, CustodyError> {
        let now = Instant::now();
        self.subjects
            .get(subject_id)
            .and_then(|state| state.active_unlock(now))
            .ok_or(CustodyError::Locked)
    }

    /// Return the subject to `Locked`. Returns whether it was unlocked.
    pub fn lock(&self, subject_id: &str) -> bool {
        let now = Instant::now();
        match self.subjects.get_mut(subject_id) {
            Some(mut state) => {
                let was_unlocked = state.active_unlock(now).is_some();
                state.unlocked = None;
                if was_unlocked {
                    tracing::info!(subject_id = %subject_id, "Gate locked");
                }
                was_unlocked
            }
            None => false,
        }
    }

    pub fn phase(&self, subject_id: &str) -> GatePhase {
        self.status(subject_id).phase
    }

    pub fn status(&self, subject_id: &str) -> GateStatus {
        let now = Instant::now();
        let Some(state) = self.subjects.get(subject_id) else {
            return GateStatus {
                phase: GatePhase::Locked,
                unlock_remaining: None,
                lockout_remaining: None,
            };
        };

        let unlock_remaining = state.active_unlock(now).map(|u| u.expires_at - now);
        let phase = if state.in_flight > 0 {
            GatePhase::Authenticating
        } else if unlock_remaining.is_some() {
            GatePhase::Unlocked
        } else {
            GatePhase::Locked
        };

        GateStatus {
            phase,
            unlock_remaining,
            lockout_remaining: state.lockout_remaining(now),
        }
    }

    /// Lock every subject whose unlock has expired. Returns those subjects.
    pub fn expire_sessions(&self) -> Vec<String> {
        let now = Instant::now();
        let mut expired = Vec::new();
        for mut entry in self.subjects.iter_mut() {
            if entry.unlocked.is_some_and(|u| u.expires_at <= now) {
                entry.unlocked = None;
                expired.push(entry.key().clone());
            }
        }
        expired
    }

    /// Drop attempt history past retention and forget idle subjects.
    pub fn evict_attempts(&self) -> usize {
        let now = Instant::now();
        let retention = self.policy.attempt_retention;
        let mut evicted = 0;
        self.subjects.retain(|_, state| {
            evicted += state.attempts.evict(now, retention);
            !state.is_idle(now)
        });
        evicted
    }

    /// Attempts currently remembered for a subject.
    pub fn attempt_count(&self, subject_id: &str) -> usize {
        self.subjects
            .get(subject_id)
            .map(|state| state.attempts.len())
            .unwrap_or(0)
    }

    fn check_lockout(&self, subject_id: &str, target_file_id: Option<&str>) -> Option<Duration> {
        let now = Instant::now();
        let mut state = self.subjects.get_mut(subject_id)?;
        let remaining = state.lockout_remaining(now)?;
        state.attempts.record(DisclosureAttempt::new(
            subject_id,
            target_file_id,
            now,
            AttemptOutcome::LockedOut,
        ));
        tracing::warn!(
            subject_id = %subject_id,
            retry_after_secs = ceil_secs(remaining),
            "Attempt rejected during lockout"
        );
        Some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CredentialError, MemoryCredentialVerifier};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Counts calls and delegates to an in-memory verifier.
    struct CountingVerifier {
        inner: MemoryCredentialVerifier,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialVerifier for CountingVerifier {
        async fn verify_credential(
            &self,
            subject_id: &str,
            credential: &Credential,
        ) -> Result<bool, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.verify_credential(subject_id, credential).await
        }
    }

    /// Never answers until notified.
    struct BlockingVerifier {
        release: Notify,
    }

    #[async_trait]
    impl CredentialVerifier for BlockingVerifier {
        async fn verify_credential(
            &self,
            _subject_id: &str,
            _credential: &Credential,
        ) -> Result<bool, CredentialError> {
            self.release.notified().await;
            Ok(true)
        }
    }

    struct DownVerifier;

    #[async_trait]
    impl CredentialVerifier for DownVerifier {
        async fn verify_credential(
            &self,
            _subject_id: &str,
            _credential: &Credential,
        ) -> Result<bool, CredentialError> {
            Err(CredentialError::Unavailable("connection refused".to_string()))
        }
    }

    fn counting_gate() -> (Arc<CountingVerifier>, DisclosureGate) {
        let verifier = Arc::new(CountingVerifier {
            inner: MemoryCredentialVerifier::new().with_account("alice", "right"),
            calls: AtomicUsize::new(0),
        });
        let gate = DisclosureGate::new(verifier.clone(), GatePolicy::default());
        (verifier, gate)
    }

    fn right() -> Credential {
        Credential::new("right")
    }

    fn wrong() -> Credential {
        Credential::new("wrong")
    }

    #[tokio::test(start_paused = true)]
    async fn correct_credential_unlocks() {
        let (_, gate) = counting_gate();
        assert_eq!(gate.require_unlocked("alice"), Err(CustodyError::Locked));

        let unlocked = gate.authenticate("alice", &right(), None).await.unwrap();
        assert_eq!(gate.require_unlocked("alice"), Ok(unlocked));
        assert_eq!(gate.phase("alice"), GatePhase::Unlocked);
        // Unlock is per subject.
        assert_eq!(gate.require_unlocked("bob"), Err(CustodyError::Locked));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_credential_is_auth_failure() {
        let (_, gate) = counting_gate();
        assert_eq!(
            gate.authenticate("alice", &wrong(), Some("f1")).await,
            Err(CustodyError::AuthFailure)
        );
        assert_eq!(gate.phase("alice"), GatePhase::Locked);
        assert_eq!(gate.attempt_count("alice"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lockout_after_max_failures_skips_verifier() {
        let (verifier, gate) = counting_gate();
        for _ in 0..5 {
            assert_eq!(
                gate.authenticate("alice", &wrong(), None).await,
                Err(CustodyError::AuthFailure)
            );
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 5);

        let err = gate.authenticate("alice", &right(), None).await.unwrap_err();
        assert_eq!(
            err,
            CustodyError::LockedOut {
                retry_after_secs: 900
            }
        );
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 5);
        assert_eq!(gate.require_unlocked("alice"), Err(CustodyError::Locked));
    }

    #[tokio::test(start_paused = true)]
    async fn lockout_ends_after_cooldown() {
        let (_, gate) = counting_gate();
        for _ in 0..5 {
            let _ = gate.authenticate("alice", &wrong(), None).await;
        }

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(
            gate.authenticate("alice", &right(), None).await,
            Err(CustodyError::LockedOut {
                retry_after_secs: 300
            })
        );

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(gate.authenticate("alice", &right(), None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_spread_beyond_window_do_not_lock_out() {
        let (_, gate) = counting_gate();
        for _ in 0..4 {
            let _ = gate.authenticate("alice", &wrong(), None).await;
        }
        tokio::time::advance(Duration::from_secs(301)).await;
        let _ = gate.authenticate("alice", &wrong(), None).await;

        assert!(gate.authenticate("alice", &right(), None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let (_, gate) = counting_gate();
        for _ in 0..4 {
            let _ = gate.authenticate("alice", &wrong(), None).await;
        }
        gate.authenticate("alice", &right(), None).await.unwrap();
        for _ in 0..4 {
            let _ = gate.authenticate("alice", &wrong(), None).await;
        }
        assert!(gate.authenticate("alice", &right(), None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_expires_after_ttl() {
        let (_, gate) = counting_gate();
        gate.authenticate("alice", &right(), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(gate.require_unlocked("alice").is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(gate.require_unlocked("alice"), Err(CustodyError::Locked));
        assert_eq!(gate.expire_sessions(), vec!["alice".to_string()]);
        assert!(gate.expire_sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lock_and_reunlock_changes_epoch() {
        let (_, gate) = counting_gate();
        let first = gate.authenticate("alice", &right(), None).await.unwrap();

        assert!(gate.lock("alice"));
        assert!(!gate.lock("alice"));
        assert_eq!(gate.require_unlocked("alice"), Err(CustodyError::Locked));

        let second = gate.authenticate("alice", &right(), None).await.unwrap();
        assert!(second.epoch > first.epoch);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_service_records_nothing() {
        let gate = DisclosureGate::new(Arc::new(DownVerifier), GatePolicy::default());
        for _ in 0..10 {
            let err = gate.authenticate("alice", &right(), None).await.unwrap_err();
            assert!(matches!(err, CustodyError::AuthUnavailable(_)));
            assert!(err.is_retryable());
        }
        assert_eq!(gate.attempt_count("alice"), 0);
        assert_eq!(gate.phase("alice"), GatePhase::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_check_records_nothing() {
        let gate = DisclosureGate::new(
            Arc::new(BlockingVerifier {
                release: Notify::new(),
            }),
            GatePolicy::default(),
        );
        let err = gate.authenticate("alice", &right(), None).await.unwrap_err();
        assert!(matches!(err, CustodyError::AuthUnavailable(_)));
        assert_eq!(gate.attempt_count("alice"), 0);
        assert_eq!(gate.phase("alice"), GatePhase::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_check_leaves_no_trace() {
        let verifier = Arc::new(BlockingVerifier {
            release: Notify::new(),
        });
        let gate = Arc::new(DisclosureGate::new(verifier, GatePolicy::default()));

        let task = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.authenticate("alice", &right(), None).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(gate.phase("alice"), GatePhase::Authenticating);

        task.abort();
        let _ = task.await;

        assert_eq!(gate.phase("alice"), GatePhase::Locked);
        assert_eq!(gate.attempt_count("alice"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn evict_attempts_forgets_idle_subjects() {
        let (_, gate) = counting_gate();
        let _ = gate.authenticate("alice", &wrong(), None).await;
        assert_eq!(gate.evict_attempts(), 0);
        assert_eq!(gate.attempt_count("alice"), 1);

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert_eq!(gate.evict_attempts(), 1);
        assert_eq!(gate.attempt_count("alice"), 0);
        assert!(gate.subjects.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_remaining_times() {
        let (_, gate) = counting_gate();
        gate.authenticate("alice", &right(), None).await.unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;

        let status = gate.status("alice");
        assert_eq!(status.phase, GatePhase::Unlocked);
        assert_eq!(status.unlock_remaining, Some(Duration::from_secs(500)));
        assert_eq!(status.lockout_remaining, None);
    }
}
