// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run distance series with month -> week -> day -> activity drill-down.
//!
//! Buckets are UTC calendar units. Month, week and day values are kilometers
//! rounded to one decimal; activity points carry the exact distance.

use crate::analytics::windows::{month_start, next_month, previous_month};
use crate::models::Activity;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Level of the drill-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceGranularity {
    Month,
    Week,
    Day,
    Activity,
}

/// Query form of a [`DistanceScope`], used both for request parameters and
/// for the navigation links in a [`DistanceSeries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceQuery {
    pub granularity: DistanceGranularity,
    /// `YYYY-MM`, required for `week`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    /// `YYYY-MM-DD`, required for `day`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_start: Option<String>,
    /// `YYYY-MM-DD`, required for `activity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
}

/// One level of the drill-down together with the date it is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceScope {
    /// Every month from the first run to the last.
    Months,
    /// ISO weeks overlapping the month starting on `month`.
    Weeks { month: NaiveDate },
    /// Seven days from `week_start`.
    Days { week_start: NaiveDate },
    /// Each run on `day`.
    Activities { day: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistancePoint {
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub value_km: f64,
    pub label: String,
    /// Query for the next level down; absent at activity level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill: Option<DistanceQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceSeries {
    pub granularity: DistanceGranularity,
    pub points: Vec<DistancePoint>,
    pub back: Option<DistanceQuery>,
    pub previous: Option<DistanceQuery>,
    pub next: Option<DistanceQuery>,
}

impl DistanceScope {
    /// Validate request parameters. The error names the missing or malformed one.
    pub fn from_query(query: &DistanceQuery) -> Result<Self, String> {
        match query.granularity {
            DistanceGranularity::Month => Ok(Self::Months),
            DistanceGranularity::Week => {
                let month = query.month.as_deref().ok_or("Missing month")?;
                let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
                    .map_err(|_| format!("Invalid month {month:?}"))?;
                Ok(Self::Weeks { month: first })
            }
            DistanceGranularity::Day => {
                let week_start = parse_day(query.week_start.as_deref(), "week_start")?;
                Ok(Self::Days { week_start })
            }
            DistanceGranularity::Activity => {
                let day = parse_day(query.day.as_deref(), "day")?;
                Ok(Self::Activities { day })
            }
        }
    }

    pub fn granularity(&self) -> DistanceGranularity {
        match self {
            Self::Months => DistanceGranularity::Month,
            Self::Weeks { .. } => DistanceGranularity::Week,
            Self::Days { .. } => DistanceGranularity::Day,
            Self::Activities { .. } => DistanceGranularity::Activity,
        }
    }

    pub fn to_query(&self) -> DistanceQuery {
        let mut query = DistanceQuery {
            granularity: self.granularity(),
            month: None,
            week_start: None,
            day: None,
        };
        match self {
            Self::Months => {}
            Self::Weeks { month } => query.month = Some(month.format("%Y-%m").to_string()),
            Self::Days { week_start } => query.week_start = Some(day_key(*week_start)),
            Self::Activities { day } => query.day = Some(day_key(*day)),
        }
        query
    }

    /// Range of runs needed for this scope; `None` means every run.
    pub fn fetch_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match *self {
            Self::Months => None,
            Self::Weeks { month } => Some((midnight(month), midnight(next_month(month)))),
            Self::Days { week_start } => {
                Some((midnight(week_start), midnight(week_start + Duration::days(7))))
            }
            Self::Activities { day } => Some((midnight(day), midnight(day + Duration::days(1)))),
        }
    }

    /// Scope one level down from a point of this scope.
    pub fn drill(&self, point_start: DateTime<Utc>) -> Option<Self> {
        let date = point_start.date_naive();
        match self {
            Self::Months => Some(Self::Weeks {
                month: month_start(date),
            }),
            Self::Weeks { .. } => Some(Self::Days { week_start: date }),
            Self::Days { .. } => Some(Self::Activities { day: date }),
            Self::Activities { .. } => None,
        }
    }

    /// Scope one level up.
    pub fn back(&self) -> Option<Self> {
        match *self {
            Self::Months => None,
            Self::Weeks { .. } => Some(Self::Months),
            Self::Days { week_start } => Some(Self::Weeks {
                month: month_start(week_start),
            }),
            Self::Activities { day } => Some(Self::Days {
                week_start: iso_week_start(day),
            }),
        }
    }

    /// Same level, one unit earlier (`forward == false`) or later.
    pub fn shift(&self, forward: bool) -> Option<Self> {
        let days = |n: i64| if forward { Duration::days(n) } else { -Duration::days(n) };
        match *self {
            Self::Months => None,
            Self::Weeks { month } => Some(Self::Weeks {
                month: if forward {
                    next_month(month)
                } else {
                    previous_month(month)
                },
            }),
            Self::Days { week_start } => Some(Self::Days {
                week_start: week_start + days(7),
            }),
            Self::Activities { day } => Some(Self::Activities { day: day + days(1) }),
        }
    }

    /// Bucket `runs` for this scope, with navigation links.
    pub fn series(&self, runs: &[Activity]) -> DistanceSeries {
        let mut points = match *self {
            Self::Months => month_points(runs),
            Self::Weeks { month } => week_points(runs, month),
            Self::Days { week_start } => day_points(runs, week_start),
            Self::Activities { day } => activity_points(runs, day),
        };
        for point in &mut points {
            point.drill = self.drill(point.start).map(|scope| scope.to_query());
        }

        DistanceSeries {
            granularity: self.granularity(),
            points,
            back: self.back().map(|s| s.to_query()),
            previous: self.shift(false).map(|s| s.to_query()),
            next: self.shift(true).map(|s| s.to_query()),
        }
    }
}

fn parse_day(value: Option<&str>, name: &str) -> Result<NaiveDate, String> {
    let value = value.ok_or_else(|| format!("Missing {name}"))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| format!("Invalid {name} {value:?}"))
}

fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Monday on or before `date`.
pub fn iso_week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Kilometers covered by runs starting in `[start, end)`, to one decimal.
fn sum_km(runs: &[Activity], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let meters: f64 = runs
        .iter()
        .filter(|a| a.start_date >= start && a.start_date < end)
        .map(|a| a.distance)
        .sum();
    (meters / 100.0).round() / 10.0
}

fn bucket(start: DateTime<Utc>, end: DateTime<Utc>, value_km: f64, label: String) -> DistancePoint {
    DistancePoint {
        start,
        end: Some(end),
        value_km,
        label,
        drill: None,
    }
}

/// One point per month from the first run's month through the last run's.
fn month_points(runs: &[Activity]) -> Vec<DistancePoint> {
    let dates = runs.iter().map(|a| a.start_date.date_naive());
    let (Some(first), Some(last)) = (dates.clone().min(), dates.max()) else {
        return Vec::new();
    };

    let end = next_month(month_start(last));
    let mut month = month_start(first);
    let mut points = Vec::new();
    while month < end {
        let next = next_month(month);
        let (start, stop) = (midnight(month), midnight(next));
        points.push(bucket(start, stop, sum_km(runs, start, stop), month.format("%b").to_string()));
        month = next;
    }
    points
}

/// ISO weeks overlapping the month. Only days inside the month are counted.
fn week_points(runs: &[Activity], month: NaiveDate) -> Vec<DistancePoint> {
    let month_end = next_month(month);
    let (lower, upper) = (midnight(month), midnight(month_end));

    let mut cursor = iso_week_start(month);
    let mut points = Vec::new();
    while cursor < month_end {
        let next = cursor + Duration::days(7);
        let (start, stop) = (midnight(cursor), midnight(next));
        let value = sum_km(runs, start.max(lower), stop.min(upper));
        points.push(bucket(start, stop, value, format!("Week {}", points.len() + 1)));
        cursor = next;
    }
    points
}

fn day_points(runs: &[Activity], week_start: NaiveDate) -> Vec<DistancePoint> {
    (0..7)
        .map(|offset| {
            let day = week_start + Duration::days(offset);
            let (start, stop) = (midnight(day), midnight(day + Duration::days(1)));
            bucket(start, stop, sum_km(runs, start, stop), day.format("%a %-d").to_string())
        })
        .collect()
}

/// Each run on `day`, oldest first.
fn activity_points(runs: &[Activity], day: NaiveDate) -> Vec<DistancePoint> {
    let (start, stop) = (midnight(day), midnight(day + Duration::days(1)));
    let mut on_day: Vec<&Activity> = runs
        .iter()
        .filter(|a| a.start_date >= start && a.start_date < stop)
        .collect();
    on_day.sort_by_key(|a| a.start_date);

    on_day
        .into_iter()
        .map(|a| DistancePoint {
            start: a.start_date,
            end: None,
            value_km: a.distance / 1000.0,
            label: a.start_date.format("%H:%M").to_string(),
            drill: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SportType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run(id: &str, start: DateTime<Utc>, distance: f64) -> Activity {
        Activity {
            id: id.to_string(),
            athlete_id: 1,
            name: None,
            start_date: start,
            timezone: None,
            sport_type: SportType::Run,
            distance,
            moving_time: 1800,
            elapsed_time: 1800,
            elevation_gain: 0.0,
            average_speed: 0.0,
            max_speed: 0.0,
            average_heartrate: None,
            summary_polyline: None,
            start_lat: None,
            start_lng: None,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_drill_down_from_month_and_week() {
        let point_start = at(2026, 1, 6, 0);

        let weeks = DistanceScope::Months.drill(point_start).unwrap();
        assert_eq!(weeks.granularity(), DistanceGranularity::Week);
        assert_eq!(weeks.to_query().month.as_deref(), Some("2026-01"));

        let days = weeks.drill(point_start).unwrap();
        assert_eq!(days.granularity(), DistanceGranularity::Day);
        assert_eq!(days.to_query().week_start.as_deref(), Some("2026-01-06"));

        let activities = days.drill(point_start).unwrap();
        assert_eq!(activities, DistanceScope::Activities { day: date(2026, 1, 6) });
        assert!(activities.drill(point_start).is_none());
    }

    #[test]
    fn test_back_from_day_lands_on_its_iso_week() {
        let back = DistanceScope::Activities { day: date(2026, 1, 16) }.back().unwrap();
        assert_eq!(back.granularity(), DistanceGranularity::Day);
        assert_eq!(back.to_query().week_start.as_deref(), Some("2026-01-12"));

        let back = back.back().unwrap();
        assert_eq!(back, DistanceScope::Weeks { month: date(2026, 1, 1) });
        assert_eq!(back.back(), Some(DistanceScope::Months));
        assert_eq!(DistanceScope::Months.back(), None);
    }

    #[test]
    fn test_shift_moves_by_one_unit() {
        let weeks = DistanceScope::Weeks { month: date(2026, 1, 1) };
        assert_eq!(weeks.shift(false), Some(DistanceScope::Weeks { month: date(2025, 12, 1) }));
        assert_eq!(weeks.shift(true), Some(DistanceScope::Weeks { month: date(2026, 2, 1) }));

        let days = DistanceScope::Days { week_start: date(2026, 1, 12) };
        assert_eq!(days.shift(true), Some(DistanceScope::Days { week_start: date(2026, 1, 19) }));

        let day = DistanceScope::Activities { day: date(2026, 3, 1) };
        assert_eq!(day.shift(false), Some(DistanceScope::Activities { day: date(2026, 2, 28) }));
        assert_eq!(DistanceScope::Months.shift(true), None);
    }

    #[test]
    fn test_query_round_trips_through_scope() {
        let query = DistanceQuery {
            granularity: DistanceGranularity::Week,
            month: Some("2026-01".to_string()),
            week_start: None,
            day: None,
        };
        let scope = DistanceScope::from_query(&query).unwrap();
        assert_eq!(scope.to_query(), query);
    }

    #[test]
    fn test_missing_or_bad_anchor_is_rejected() {
        let mut query = DistanceQuery {
            granularity: DistanceGranularity::Week,
            month: None,
            week_start: None,
            day: None,
        };
        assert_eq!(DistanceScope::from_query(&query).unwrap_err(), "Missing month");

        query.month = Some("2026-13".to_string());
        assert!(DistanceScope::from_query(&query).is_err());

        query.granularity = DistanceGranularity::Activity;
        assert_eq!(DistanceScope::from_query(&query).unwrap_err(), "Missing day");
    }

    #[test]
    fn test_months_span_first_to_last_run_with_empty_gaps() {
        let runs = vec![
            run("1", at(2025, 11, 3, 7), 5040.0),
            run("2", at(2025, 11, 20, 7), 10000.0),
            run("3", at(2026, 1, 2, 7), 8000.0),
        ];
        let series = DistanceScope::Months.series(&runs);

        let values: Vec<(String, f64)> = series
            .points
            .iter()
            .map(|p| (p.label.clone(), p.value_km))
            .collect();
        assert_eq!(
            values,
            vec![
                ("Nov".to_string(), 15.0),
                ("Dec".to_string(), 0.0),
                ("Jan".to_string(), 8.0)
            ]
        );
        assert_eq!(series.points[0].start, at(2025, 11, 1, 0));
        assert_eq!(series.points[0].end, Some(at(2025, 12, 1, 0)));
        assert_eq!(series.points[1].drill.as_ref().unwrap().month.as_deref(), Some("2025-12"));
        assert!(series.back.is_none() && series.previous.is_none() && series.next.is_none());
    }

    #[test]
    fn test_no_runs_no_month_points() {
        assert!(DistanceScope::Months.series(&[]).points.is_empty());
    }

    #[test]
    fn test_weeks_clip_to_month() {
        // January 2026 starts on a Thursday; its first ISO week begins 2025-12-29.
        let runs = vec![
            run("1", at(2025, 12, 30, 7), 6000.0),
            run("2", at(2026, 1, 1, 7), 4000.0),
            run("3", at(2026, 1, 31, 7), 12000.0),
            run("4", at(2026, 2, 1, 7), 9000.0),
        ];
        let scope = DistanceScope::Weeks { month: date(2026, 1, 1) };
        let series = scope.series(&runs);

        assert_eq!(series.points.len(), 5);
        assert_eq!(series.points[0].start, at(2025, 12, 29, 0));
        assert_eq!(series.points[0].label, "Week 1");
        assert_eq!(series.points[0].value_km, 4.0);
        assert_eq!(series.points[4].value_km, 12.0);
        assert_eq!(
            series.points[0].drill.as_ref().unwrap().week_start.as_deref(),
            Some("2025-12-29")
        );
        assert_eq!(series.previous.unwrap().month.as_deref(), Some("2025-12"));
        assert_eq!(series.back.unwrap().granularity, DistanceGranularity::Month);
    }

    #[test]
    fn test_days_cover_seven_buckets() {
        let runs = vec![
            run("1", at(2026, 1, 12, 6), 5000.0),
            run("2", at(2026, 1, 12, 18), 3260.0),
            run("3", at(2026, 1, 18, 23), 21097.5),
            run("4", at(2026, 1, 19, 0), 10000.0),
        ];
        let series = DistanceScope::Days { week_start: date(2026, 1, 12) }.series(&runs);

        let values: Vec<f64> = series.points.iter().map(|p| p.value_km).collect();
        assert_eq!(values, vec![8.3, 0.0, 0.0, 0.0, 0.0, 0.0, 21.1]);
        assert_eq!(series.points[0].label, "Mon 12");
        assert_eq!(series.points[6].drill.as_ref().unwrap().day.as_deref(), Some("2026-01-18"));
    }

    #[test]
    fn test_activity_points_are_exact_and_ordered() {
        let runs = vec![
            run("2", at(2026, 1, 16, 18), 3260.0),
            run("1", at(2026, 1, 16, 6), 5012.0),
            run("3", at(2026, 1, 17, 6), 8000.0),
        ];
        let series = DistanceScope::Activities { day: date(2026, 1, 16) }.series(&runs);

        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].value_km, 5.012);
        assert_eq!(series.points[0].label, "06:00");
        assert_eq!(series.points[0].end, None);
        assert!(series.points.iter().all(|p| p.drill.is_none()));
        assert_eq!(series.next.unwrap().day.as_deref(), Some("2026-01-17"));
    }
}
