// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure analytics: window boundaries, effort resolution, stream extraction,
//! record merging, window totals and distance series. No I/O.

pub mod distance;
pub mod efforts;
pub mod merge;
pub mod streams;
pub mod totals;
pub mod windows;

pub use distance::{DistanceGranularity, DistancePoint, DistanceQuery, DistanceScope, DistanceSeries};
pub use efforts::{
    candidate_for, effort_tolerance, estimate_from_activity_distance, estimate_from_longer_effort,
    is_effort_usable_for_target, resolve_effort_for_target,
};
pub use merge::{best_records, merge_distance_records, RecordSet};
pub use streams::{best_effort_from_streams, best_effort_seconds};
pub use totals::{best_activity_ids, compute_totals};
pub use windows::{rolling_range, window_range, WindowRange};
