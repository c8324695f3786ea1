//! Date-window and equality filtering of normalized submissions.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::dates::parse_timestamp;
use crate::error::ApiError;
use crate::models::{FieldValue, FormResponse, NormalizedRecord};

// ---

const DEFAULT_BEGIN: &str = "2000-01-01";
const DEFAULT_END_SPAN_DAYS: i64 = 365 * 10;

/// Half-open interval `[begin, end)` of submission dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// Build the window from the optional `beginDateTime`/`endDateTime`
    /// query values.
    ///
    /// Begin defaults to 2000-01-01 and end to ten years after `now`. Equal
    /// bounds (typically the same calendar day twice) widen the window to a
    /// full day.
    pub fn from_params(
        begin: Option<&str>,
        end: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, ApiError> {
        // ---
        let begin = parse_bound(begin.unwrap_or(DEFAULT_BEGIN), "beginDateTime")?;
        let mut end = match end {
            Some(raw) => parse_bound(raw, "endDateTime")?,
            None => shift_days(now, DEFAULT_END_SPAN_DAYS, "endDateTime")?,
        };

        if end == begin {
            end = shift_days(end, 1, "endDateTime")?;
        }
        if begin > end {
            return Err(ApiError::BadRequest(
                "beginDateTime value must be lower than endDateTime".to_string(),
            ));
        }

        Ok(DateWindow { begin, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.begin <= instant && instant < self.end
    }
}

/// Chrono's `+` panics past `NaiveDate::MAX`; far-future bounds are a
/// client error instead.
fn shift_days(instant: DateTime<Utc>, days: i64, name: &str) -> Result<DateTime<Utc>, ApiError> {
    instant
        .checked_add_signed(Duration::days(days))
        .ok_or_else(|| ApiError::BadRequest(format!("{name} value is out of range")))
}

fn parse_bound(raw: &str, name: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_timestamp(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {name} value: '{raw}'")))
}

/// True when every filter matches the record exactly.
///
/// Filters compare strings only: an integer measure or the date instant
/// never equals a filter value, and neither does a missing field.
fn matches_filters(record: &NormalizedRecord, filters: &HashMap<String, String>) -> bool {
    filters.iter().all(|(key, required)| {
        matches!(record.field(key), Some(FieldValue::Text(v)) if v == required.as_str())
    })
}

/// Keep records inside `window` that satisfy `filters`, oldest first.
pub fn filter_and_sort(
    records: Vec<NormalizedRecord>,
    window: &DateWindow,
    filters: &HashMap<String, String>,
) -> Vec<FormResponse> {
    // ---
    let mut kept: Vec<NormalizedRecord> = records
        .into_iter()
        .filter(|r| window.contains(r.date))
        .filter(|r| matches_filters(r, filters))
        .collect();

    kept.sort_by_key(|r| r.date);

    kept.into_iter()
        .map(NormalizedRecord::into_response)
        .collect()
}
