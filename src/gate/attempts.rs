// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Disclosure attempt history for lockout accounting.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Upper bound on remembered attempts per subject.
pub const MAX_ATTEMPTS_PER_SUBJECT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    LockedOut,
}

#[derive(Debug, Clone)]
pub struct DisclosureAttempt {
    pub subject_id: String,
    pub target_file_id: Option<String>,
    /// Monotonic time used for window arithmetic.
    pub timestamp: Instant,
    /// Wall-clock time for reporting.
    pub recorded_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl DisclosureAttempt {
    pub fn new(
        subject_id: &str,
        target_file_id: Option<&str>,
        timestamp: Instant,
        outcome: AttemptOutcome,
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            target_file_id: target_file_id.map(str::to_string),
            timestamp,
            recorded_at: Utc::now(),
            outcome,
        }
    }
}

/// One subject's attempts, oldest first.
#[derive(Debug, Default)]
pub struct AttemptHistory {
    attempts: VecDeque<DisclosureAttempt>,
}

impl AttemptHistory {
    pub fn record(&mut self, attempt: DisclosureAttempt) {
        if self.attempts.len() == MAX_ATTEMPTS_PER_SUBJECT {
            self.attempts.pop_front();
        }
        self.attempts.push_back(attempt);
    }

    /// Failures since the last success, counting only those inside `window`.
    ///
    /// Locked-out attempts never reached the credential check and are ignored.
    pub fn consecutive_failures(&self, now: Instant, window: Duration) -> usize {
        let mut count = 0;
        for attempt in self.attempts.iter().rev() {
            match attempt.outcome {
                AttemptOutcome::Success => break,
                AttemptOutcome::LockedOut => continue,
                AttemptOutcome::Failure => {
                    if now.saturating_duration_since(attempt.timestamp) > window {
                        break;
                    }
                    count += 1;
                }
            }
        }
        count
    }

    /// Drop attempts older than `retention`. Returns how many were dropped.
    pub fn evict(&mut self, now: Instant, retention: Duration) -> usize {
        let before = self.attempts.len();
        while self
            .attempts
            .front()
            .is_some_and(|a| now.saturating_duration_since(a.timestamp) > retention)
        {
            self.attempts.pop_front();
        }
        before - self.attempts.len()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisclosureAttempt> {
        self.attempts.iter()
    }
}
