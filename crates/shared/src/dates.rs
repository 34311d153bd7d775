//! Calendar date handling for the `DD/MM/YYYY` wire format.
//!
//! All instants are UTC. A date-only input resolves to midnight UTC of that
//! day; a `DD/MM/YYYY HH:MM:SS` input keeps its time of day.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;

const DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid date '{0}', expected DD/MM/YYYY or DD/MM/YYYY HH:MM:SS")]
pub struct DateParseError(pub String);

/// Parses `DD/MM/YYYY HH:MM:SS` or `DD/MM/YYYY` into a UTC instant.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, DATE_TIME_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(midnight)
        .map_err(|_| DateParseError(trimmed.to_string()))
}

/// Parses a date-only `DD/MM/YYYY` value.
pub fn parse_day(input: &str) -> Result<NaiveDate, DateParseError> {
    parse_date(input).map(|instant| instant.date_naive())
}

/// Renders an instant as `DD/MM/YYYY`.
pub fn format_date(instant: DateTime<Utc>) -> String {
    instant.format(DATE_FORMAT).to_string()
}

/// Renders an instant as `DD/MM/YYYY HH:MM:SS`.
pub fn format_date_time(instant: DateTime<Utc>) -> String {
    instant.format(DATE_TIME_FORMAT).to_string()
}

/// Truncates an instant to midnight UTC of its day.
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    midnight(instant.date_naive())
}

/// Midnight UTC of the given calendar day.
pub fn midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}
