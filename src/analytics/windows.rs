// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar and rolling window boundaries.
//!
//! All boundaries are computed in the athlete's local time (UTC shifted by
//! `tz_offset_minutes`, east positive) and returned as UTC instants. `end`
//! is exclusive.

use crate::models::WindowType;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;

/// A concrete time range plus the key it is persisted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub key: String,
}

/// Resolve a window type to its range containing `now`.
pub fn window_range(window: WindowType, now: DateTime<Utc>, tz_offset_minutes: i32) -> WindowRange {
    let offset = Duration::minutes(i64::from(tz_offset_minutes));
    let local = now.naive_utc() + offset;
    let today = local.date();
    let to_utc = |date: NaiveDate| -> DateTime<Utc> {
        let midnight: NaiveDateTime = date.and_time(NaiveTime::default());
        Utc.from_utc_datetime(&(midnight - offset))
    };

    match window {
        WindowType::Week => {
            let start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            WindowRange {
                start: to_utc(start),
                end: to_utc(start + Duration::days(7)),
                key: start.format("%Y-%m-%d").to_string(),
            }
        }
        WindowType::Month => {
            let start = month_start(today);
            WindowRange {
                start: to_utc(start),
                end: to_utc(next_month(start)),
                key: month_key(start),
            }
        }
        WindowType::Last2M => trailing_months(today, 2, "rolling-2m", to_utc),
        WindowType::Last6M => trailing_months(today, 6, "rolling-6m", to_utc),
        WindowType::Last365 => {
            let start = today - Duration::days(364);
            WindowRange {
                start: to_utc(start),
                end: to_utc(today + Duration::days(1)),
                key: format!("rolling-365d-{}", start.format("%Y-%m-%d")),
            }
        }
        WindowType::Year => {
            let start = year_start(today);
            WindowRange {
                start: to_utc(start),
                end: to_utc(next_year(start)),
                key: start.year().to_string(),
            }
        }
        WindowType::LastYear => {
            let this_year = year_start(today);
            let start = year_start(this_year - Duration::days(1));
            WindowRange {
                start: to_utc(start),
                end: to_utc(this_year),
                key: start.year().to_string(),
            }
        }
        WindowType::AllTime => WindowRange {
            start: DateTime::<Utc>::UNIX_EPOCH,
            end: to_utc(today + Duration::days(1)),
            key: "all-time".to_string(),
        },
    }
}

/// Unaligned trailing window of `days` ending at `now`.
///
/// Used for the supplementary rolling-week view; its key lives outside the
/// calendar keyspace.
pub fn rolling_range(days: u32, now: DateTime<Utc>) -> WindowRange {
    WindowRange {
        start: now - Duration::days(i64::from(days)),
        end: now,
        key: format!("rolling-{days}d"),
    }
}

/// First day of the month `count - 1` months back through the end of the current month.
fn trailing_months(
    today: NaiveDate,
    count: u32,
    prefix: &str,
    to_utc: impl Fn(NaiveDate) -> DateTime<Utc>,
) -> WindowRange {
    let current = month_start(today);
    let start = (1..count).fold(current, |m, _| previous_month(m));
    WindowRange {
        start: to_utc(start),
        end: to_utc(next_month(current)),
        key: format!("{prefix}-{}", month_key(start)),
    }
}

fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub(crate) fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// `first` must be the first of a month.
pub(crate) fn next_month(first: NaiveDate) -> NaiveDate {
    month_start(first + Duration::days(31))
}

/// `first` must be the first of a month.
pub(crate) fn previous_month(first: NaiveDate) -> NaiveDate {
    month_start(first - Duration::days(1))
}

fn year_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.ordinal0()))
}

/// `first` must be January 1st.
fn next_year(first: NaiveDate) -> NaiveDate {
    year_start(first + Duration::days(366))
}
