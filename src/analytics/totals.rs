// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Window totals and standout activities.

use crate::models::{Activity, BestActivityIds, Totals};

/// Sum distance, moving time and elevation over `activities`.
///
/// `avg_speed` is total distance over total moving time, 0 when no time was
/// recorded.
pub fn compute_totals(activities: &[Activity]) -> Totals {
    let mut totals = activities.iter().fold(Totals::default(), |mut acc, a| {
        acc.total_distance += a.distance;
        acc.total_moving_time += u64::from(a.moving_time);
        acc.total_elevation_gain += a.elevation_gain;
        acc.activity_count += 1;
        acc
    });
    if totals.total_moving_time > 0 {
        totals.avg_speed = totals.total_distance / totals.total_moving_time as f64;
    }
    totals
}

/// Longest, fastest-average and biggest-climb activities.
///
/// Ties keep the earliest activity in iteration order. Activities without a
/// derivable pace are not considered for fastest.
pub fn best_activity_ids(activities: &[Activity]) -> BestActivityIds {
    let longest = max_by(activities, |a| a.distance);
    let biggest_climb = max_by(activities, |a| a.elevation_gain);
    let fastest = activities
        .iter()
        .filter_map(|a| a.pace_seconds_per_km().map(|pace| (a, pace)))
        .fold(None::<(&Activity, f64)>, |best, (a, pace)| match best {
            Some((_, current)) if current <= pace => best,
            _ => Some((a, pace)),
        })
        .map(|(a, _)| a);

    BestActivityIds {
        longest_run_id: longest.map(|a| a.id.clone()),
        fastest_avg_id: fastest.map(|a| a.id.clone()),
        biggest_climb_id: biggest_climb.map(|a| a.id.clone()),
    }
}

fn max_by(activities: &[Activity], key: impl Fn(&Activity) -> f64) -> Option<&Activity> {
    activities.iter().fold(None, |best: Option<&Activity>, a| match best {
        Some(current) if key(current) >= key(a) => Some(current),
        _ => Some(a),
    })
}
