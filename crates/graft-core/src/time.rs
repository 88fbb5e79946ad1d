//! Date and date-time literals.
//!
//! Dates are always the literal `YYYY-MM-DD` form; parsing never consults the
//! process locale. Date-times use RFC 3339, and a bare date is accepted as
//! midnight UTC.

use crate::error::{CoreError, Result};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

/// Parse a `YYYY-MM-DD` literal.
pub fn parse_date(raw: &str) -> Result<Date> {
    let format = format_description!("[year]-[month]-[day]");
    let trimmed = raw.trim();
    if trimmed.len() != 10 {
        return Err(CoreError::invalid_date(format!(
            "'{raw}' is not a YYYY-MM-DD date"
        )));
    }
    Date::parse(trimmed, &format)
        .map_err(|e| CoreError::invalid_date(format!("'{raw}' is not a YYYY-MM-DD date: {e}")))
}

pub fn format_date(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(&format)
        .unwrap_or_else(|_| format!("{}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

/// Parse an RFC 3339 timestamp, or a bare date at midnight UTC.
pub fn parse_date_time(raw: &str) -> Result<OffsetDateTime> {
    let trimmed = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(value);
    }
    let date = parse_date(trimmed).map_err(|_| {
        CoreError::invalid_date(format!("'{raw}' is neither an RFC 3339 timestamp nor a date"))
    })?;
    Ok(date.with_time(Time::MIDNIGHT).assume_utc())
}

pub fn format_date_time(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}
