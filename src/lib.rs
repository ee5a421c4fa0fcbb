// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! PR Tracker: running and riding personal records from Strava history.
//!
//! Imports an athlete's activities, caches per-run best efforts, and keeps
//! per-window totals and best times for the canonical race distances. Sync
//! work runs as background jobs whose progress can be polled over HTTP.

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{ActivitySource, SyncJobRunner};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub jobs: SyncJobRunner,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, api: Arc<dyn ActivitySource>) -> Self {
        let jobs = SyncJobRunner::new(store.clone(), api, config.sync);
        Self {
            config,
            store,
            jobs,
        }
    }
}
