use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

use crate::error::{AppError, AppResult};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|err| {
        AppError::validation_with_details(
            "invalid date format",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_datetime(value: &str) -> AppResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|err| {
        AppError::validation_with_details(
            "invalid datetime format",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub fn duration_minutes(start: NaiveDateTime, end: NaiveDateTime) -> AppResult<i64> {
    let total = end.signed_duration_since(start).num_minutes();
    if total <= 0 {
        Err(AppError::invalid_time_range(
            "end instant must be after start instant",
        ))
    } else {
        Ok(total)
    }
}

/// Half-open interval overlap: ranges sharing only an endpoint do not
/// overlap, so back-to-back shifts are fine.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}
