// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resolve a best time for a distance target from cached splits and
//! whole-activity estimates.

use crate::models::{Activity, BestEffort, RecordCandidate};

/// Targets at or below this distance may be estimated from a whole activity.
pub const MAX_PROPORTIONAL_TARGET: u32 = 10_000;

/// Targets at or above this distance may be scaled down from a longer split.
pub const MIN_LONG_TARGET: u32 = 15_000;

/// Distance-scaled tolerance in meters for matching a target.
pub fn effort_tolerance(target: u32) -> f64 {
    match target {
        0..=400 => 15.0,
        401..=1000 => 30.0,
        1001..=5000 => 120.0,
        5001..=10000 => 180.0,
        10001..=21097 => 260.0,
        _ => 420.0,
    }
}

fn within_tolerance(distance: f64, target: u32) -> bool {
    (distance.round() - f64::from(target)).abs() <= effort_tolerance(target)
}

/// Best matching cached effort for `target`.
///
/// Distance-matched efforts win over name-matched ones; among either kind the
/// fastest elapsed time is taken.
pub fn resolve_effort_for_target(efforts: &[BestEffort], target: u32) -> Option<&BestEffort> {
    efforts
        .iter()
        .filter(|e| within_tolerance(e.distance, target))
        .min_by_key(|e| e.elapsed_time)
        .or_else(|| {
            efforts
                .iter()
                .filter(|e| name_matches_target(&e.name, target))
                .min_by_key(|e| e.elapsed_time)
        })
}

/// Proportional estimate from an activity's total distance and moving time.
///
/// Only targets up to 10 km are estimated, and only when the activity itself
/// is within tolerance of the target.
pub fn estimate_from_activity_distance(distance: f64, moving_time: u32, target: u32) -> Option<u32> {
    if distance <= 0.0 || moving_time == 0 || target > MAX_PROPORTIONAL_TARGET {
        return None;
    }
    if (distance - f64::from(target)).abs() > effort_tolerance(target) {
        return None;
    }
    Some(scale_time(f64::from(moving_time), distance, target))
}

/// Scale the shortest cached split covering between `target` and
/// 1.25 x `target` down to the target distance.
pub fn estimate_from_longer_effort(efforts: &[BestEffort], target: u32) -> Option<u32> {
    if target < MIN_LONG_TARGET {
        return None;
    }
    let lower = f64::from(target);
    let upper = lower * 1.25;
    efforts
        .iter()
        .filter(|e| e.elapsed_time > 0 && e.distance >= lower && e.distance <= upper)
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
        .map(|e| scale_time(f64::from(e.elapsed_time), e.distance, target))
}

/// Whether splits from an activity of `activity_distance` meters may count
/// toward `target`. Long targets require the activity itself to be that race.
pub fn is_effort_usable_for_target(activity_distance: f64, target: u32) -> bool {
    target <= MAX_PROPORTIONAL_TARGET || within_tolerance(activity_distance, target)
}

/// Best candidate an activity contributes for `target`, if any.
pub fn candidate_for(activity: &Activity, efforts: &[BestEffort], target: u32) -> Option<RecordCandidate> {
    let usable = is_effort_usable_for_target(activity.distance, target);

    let seconds = usable
        .then(|| resolve_effort_for_target(efforts, target))
        .flatten()
        .map(|e| e.elapsed_time)
        .filter(|t| *t > 0)
        .or_else(|| estimate_from_activity_distance(activity.distance, activity.moving_time, target))
        .or_else(|| {
            if usable && target >= MIN_LONG_TARGET {
                estimate_from_longer_effort(efforts, target)
            } else {
                None
            }
        })?;

    Some(RecordCandidate {
        distance_target: target,
        best_time_seconds: seconds,
        activity_id: activity.id.clone(),
        achieved_at: activity.start_date,
    })
}

fn scale_time(seconds: f64, distance: f64, target: u32) -> u32 {
    (seconds * f64::from(target) / distance).round() as u32
}

/// Lowercase, hyphens and underscores to spaces, single-spaced, padded so
/// phrases can be matched on word boundaries.
fn normalize_label(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn has_phrase(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {phrase} "))
}

/// Canonical labels for each target, matched as whole words.
fn target_labels(target: u32) -> &'static [&'static str] {
    match target {
        400 => &["400m", "400 m"],
        805 => &["1/2 mile", "half mile", "0.5 mile", "805m"],
        1000 => &["1k", "1 km", "1km", "1000m"],
        1609 => &["1 mile", "mile"],
        3219 => &["2 mile", "2 miles"],
        5000 => &["5k", "5 km", "5km"],
        10000 => &["10k", "10 km", "10km"],
        15000 => &["15k", "15 km", "15km"],
        16093 => &["10 mile", "10 miles"],
        20000 => &["20k", "20 km", "20km"],
        21097 => &["half marathon", "hm"],
        42195 => &["marathon"],
        _ => &[],
    }
}

fn name_matches_target(name: &str, target: u32) -> bool {
    let normalized = normalize_label(name);
    match target {
        // Bare "mile" only as the whole label; "10 mile" contains it too.
        1609 => has_phrase(&normalized, "1 mile") || normalized.trim() == "mile",
        42195 => {
            has_phrase(&normalized, "marathon")
                && !has_phrase(&normalized, "half")
                && !has_phrase(&normalized, "hm")
        }
        _ => target_labels(target)
            .iter()
            .any(|label| has_phrase(&normalized, label)),
    }
}
