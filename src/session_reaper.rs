// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Reaper
//!
//! Background task that keeps disclosure state from outliving its policy
//! even when no request touches it.
//!
//! Every `sweep_interval` the reaper:
//! 1. Expires unlocks whose TTL has passed and clears their reveal state.
//! 2. Evicts disclosure attempts older than the retention period.
//! 3. Finishes deletes left pending by an interrupted request.
//!
//! Shutdown is signalled with a `tokio_util::sync::CancellationToken`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::custody::CustodyService;

pub struct SessionReaper {
    custody: Arc<CustodyService>,
    sweep_interval: Duration,
}

impl SessionReaper {
    pub fn new(custody: Arc<CustodyService>, sweep_interval: Duration) -> Self {
        Self {
            custody,
            sweep_interval,
        }
    }

    /// Run until the token is cancelled.
    ///
    /// ```rust,ignore
    /// tokio::spawn(reaper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Session reaper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Session reaper shutting down");
                return;
            }

            self.sweep_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session reaper shutting down");
                    return;
                }
            }
        }
    }

    async fn sweep_step(&self) {
        match self.custody.sweep().await {
            Ok(report) => {
                if !report.expired_subjects.is_empty() || report.completed_deletes > 0 {
                    info!(
                        expired = report.expired_subjects.len(),
                        evicted_attempts = report.evicted_attempts,
                        completed_deletes = report.completed_deletes,
                        "Session reaper: sweep complete"
                    );
                } else {
                    debug!(
                        evicted_attempts = report.evicted_attempts,
                        "Session reaper: nothing to expire"
                    );
                }
            }
            Err(e) => {
                warn!(error = %e, "Session reaper: sweep failed");
            }
        }
    }
}
