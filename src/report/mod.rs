//! Read-only query surface for the external brief renderer.
//!
//! Aggregates every record created in one week into a single value. No
//! formatting or delivery happens here; the consumer renders the brief.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::store::{
    AmbiguityRecord, FailureMode, OverrideDecision, PatternInstance, RawItem, Store,
};

/// Every record created within one week, in deterministic creation order.
#[derive(Debug, Clone, Serialize)]
pub struct WeekRecords {
    /// Inclusive start of the window (Monday, UTC midnight).
    pub week_start: DateTime<Utc>,
    /// Exclusive end of the window.
    pub week_end: DateTime<Utc>,
    /// Raw items fetched in the window.
    pub raw_items: Vec<RawItem>,
    /// Ambiguity records produced in the window.
    pub ambiguity_records: Vec<AmbiguityRecord>,
    /// Pattern instances recorded in the window.
    pub pattern_instances: Vec<PatternInstance>,
    /// Failure modes assessed in the window.
    pub failure_modes: Vec<FailureMode>,
    /// Override decisions created in the window.
    pub override_decisions: Vec<OverrideDecision>,
}

/// Collect all records for the week starting at `week_start`.
pub async fn records_for_week<S: Store>(
    store: &S,
    week_start: NaiveDate,
) -> AppResult<WeekRecords> {
    let start = Utc
        .from_utc_datetime(&week_start.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    let end = start + chrono::Duration::days(7);

    Ok(WeekRecords {
        week_start: start,
        week_end: end,
        raw_items: store.raw_items_between(start, end).await?,
        ambiguity_records: store.ambiguity_between(start, end).await?,
        pattern_instances: store.patterns_between(start, end).await?,
        failure_modes: store.failure_modes_between(start, end).await?,
        override_decisions: store.overrides_between(start, end).await?,
    })
}

/// Parse a week designator like `2026-W31` into its Monday. `None` resolves
/// to the current week.
pub fn resolve_week(designator: Option<&str>) -> AppResult<NaiveDate> {
    match designator {
        None => {
            let today = Utc::now().date_naive();
            Ok(today - chrono::Duration::days(today.weekday().num_days_from_monday() as i64))
        }
        Some(raw) => parse_week(raw),
    }
}

fn parse_week(raw: &str) -> AppResult<NaiveDate> {
    let invalid = || AppError::Config {
        message: format!("Invalid week designator '{}', expected YYYY-W##", raw),
    };

    let (year_part, week_part) = raw.split_once("-W").ok_or_else(invalid)?;
    let year: i32 = year_part.parse().map_err(|_| invalid())?;
    let week: u32 = week_part.parse().map_err(|_| invalid())?;

    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)
}
