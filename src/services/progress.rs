// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress events emitted by long-running sync work.
//!
//! Reporting is fire-and-forget: a closed or absent receiver never fails the
//! operation that is reporting.

use tokio::sync::mpsc;

/// One progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    pub phase: String,
    pub processed_steps: u32,
    pub total_steps: Option<u32>,
    pub total_activities: Option<u32>,
    pub detail_fetched: u32,
}

/// Sending half of a progress stream.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl ProgressReporter {
    /// Reporter whose events go nowhere.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Connected reporter and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn report(&self, progress: SyncProgress) {
        if let Some(tx) = &self.tx {
            if tx.send(progress).is_err() {
                tracing::debug!("Progress receiver dropped, ignoring update");
            }
        }
    }
}
