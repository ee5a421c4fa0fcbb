// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exact best-effort extraction from raw distance/time sample streams.

/// Minimum elapsed seconds to cover `target` meters anywhere in the stream.
///
/// `distance` and `time` are cumulative and monotonically non-decreasing.
/// The end of each window is linearly interpolated between the two samples
/// straddling `start + target`, so the result is exact rather than snapped to
/// a recorded sample. The end pointer never moves backwards, which keeps the
/// scan linear in the number of samples.
///
/// Returns `None` if either stream has fewer than two samples or no window
/// reaches `target` before the stream ends.
pub fn best_effort_from_streams(distance: &[f64], time: &[f64], target: f64) -> Option<f64> {
    if distance.len() < 2 || time.len() < 2 || target <= 0.0 {
        return None;
    }
    let n = distance.len().min(time.len());
    let mut best: Option<f64> = None;
    let mut j = 0;

    for i in 0..n {
        j = j.max(i);
        while j < n && distance[j] - distance[i] < target {
            j += 1;
        }
        if j >= n {
            // Later starts cover even less distance.
            break;
        }
        let (d1, d2) = (distance[j - 1], distance[j]);
        let (t1, t2) = (time[j - 1], time[j]);
        if d2 == d1 {
            continue;
        }
        let goal = distance[i] + target;
        let end_time = t1 + (goal - d1) / (d2 - d1) * (t2 - t1);
        let elapsed = end_time - time[i];
        if elapsed > 0.0 && best.map_or(true, |b| elapsed < b) {
            best = Some(elapsed);
        }
    }

    best
}

/// Whole-second variant used for persisted records.
pub fn best_effort_seconds(distance: &[f64], time: &[f64], target: u32) -> Option<u32> {
    best_effort_from_streams(distance, time, f64::from(target)).map(|s| s.round() as u32)
}
