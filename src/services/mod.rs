// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod jobs;
pub mod pacing;
pub mod progress;
pub mod records;
pub mod strava;
pub mod sync;

pub use jobs::{JobRequest, SyncJobRunner};
pub use pacing::RequestPacer;
pub use progress::{ProgressReporter, SyncProgress};
pub use records::{RecordsService, SweepResult, WindowReport};
pub use strava::{ActivitySource, StravaClient};
pub use sync::{SyncOptions, SyncOrchestrator, SyncResult};
