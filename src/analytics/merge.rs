// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Arg-min reduction of record candidates per distance target.

use crate::models::RecordCandidate;
use std::collections::BTreeMap;

/// Best candidate per distance target, ordered by target.
pub type RecordSet = BTreeMap<u32, RecordCandidate>;

/// Merge one candidate into `set`.
///
/// The candidate replaces the existing entry only when strictly faster. On an
/// exact tie the entry that arrived first is kept, so the surviving
/// `activity_id` for tied times depends on iteration order.
pub fn merge_distance_records(mut set: RecordSet, candidate: RecordCandidate) -> RecordSet {
    let replace = set
        .get(&candidate.distance_target)
        .map_or(true, |existing| candidate.best_time_seconds < existing.best_time_seconds);
    if replace {
        set.insert(candidate.distance_target, candidate);
    }
    set
}

/// Fold a candidate stream into its best-per-target set.
pub fn best_records<I>(candidates: I) -> RecordSet
where
    I: IntoIterator<Item = RecordCandidate>,
{
    candidates
        .into_iter()
        .fold(RecordSet::new(), merge_distance_records)
}
