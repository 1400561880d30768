//! Date parsing for filter values and stored timestamps.
//!
//! Stored timestamps show up either as digit-only strings (compact
//! `YYYYMMDDhhmmss...` or epoch seconds/millis) or as ISO-style text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error_handling::ConfigurationError;

/// Formats accepted by [`date_filter`].
pub const DATE_FILTER_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S"];

/// Digit-only timestamps are cut to this width, dropping sub-second digits.
const NUMERIC_TIMESTAMP_WIDTH: usize = 14;

/// Parses a filter date given as `%Y-%m-%d` or `%Y-%m-%d %H:%M:%S`.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidDate` when neither format matches.
pub fn date_filter(value: &str) -> Result<NaiveDateTime, ConfigurationError> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, DATE_FILTER_FORMATS[1]) {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FILTER_FORMATS[0]) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(ConfigurationError::InvalidDate {
        value: value.to_string(),
        formats: format!("{:?}", DATE_FILTER_FORMATS),
    })
}

/// Interprets a stored textual timestamp, or `None` if it is not one.
pub(crate) fn coerce_stored_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let digits = &raw[..raw.len().min(NUMERIC_TIMESTAMP_WIDTH)];
        return parse_numeric(digits);
    }
    parse_text(raw)
}

fn parse_numeric(digits: &str) -> Option<NaiveDateTime> {
    match digits.len() {
        8 | 12 | 14 => parse_compact(digits),
        10 => DateTime::from_timestamp(digits.parse().ok()?, 0).map(|dt| dt.naive_utc()),
        13 => DateTime::from_timestamp_millis(digits.parse().ok()?).map(|dt| dt.naive_utc()),
        _ => None,
    }
}

/// `YYYYMMDD`, `YYYYMMDDhhmm` or `YYYYMMDDhhmmss`.
fn parse_compact(digits: &str) -> Option<NaiveDateTime> {
    let field = |from: usize, to: usize| -> Option<u32> {
        match digits.get(from..to) {
            Some(part) => part.parse().ok(),
            None => Some(0),
        }
    };
    let date = NaiveDate::from_ymd_opt(field(0, 4)? as i32, field(4, 6)?, field(6, 8)?)?;
    let time = NaiveTime::from_hms_opt(field(8, 10)?, field(10, 12)?, field(12, 14)?)?;
    Some(date.and_time(time))
}

fn parse_text(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_date_filter_accepts_both_formats() {
        assert_eq!(date_filter("2021-03-04").unwrap(), at(2021, 3, 4, 0, 0, 0));
        assert_eq!(
            date_filter("2021-03-04 05:06:07").unwrap(),
            at(2021, 3, 4, 5, 6, 7)
        );
    }

    #[test]
    fn test_date_filter_rejects_other_formats() {
        let err = date_filter("04/03/2021").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidDate { .. }));
        assert!(err.to_string().contains("%Y-%m-%d"));
    }

    #[test]
    fn test_compact_timestamp_with_millis_is_truncated() {
        assert_eq!(
            coerce_stored_timestamp("20200102030405678"),
            Some(at(2020, 1, 2, 3, 4, 5))
        );
    }

    #[test]
    fn test_compact_date_only() {
        assert_eq!(
            coerce_stored_timestamp("20200102"),
            Some(at(2020, 1, 2, 0, 0, 0))
        );
    }

    #[test]
    fn test_epoch_seconds_and_millis() {
        assert_eq!(
            coerce_stored_timestamp("1577836800"),
            Some(at(2020, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            coerce_stored_timestamp("1577836800000"),
            Some(at(2020, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_iso_text() {
        assert_eq!(
            coerce_stored_timestamp("2020-01-02T03:04:05Z"),
            Some(at(2020, 1, 2, 3, 4, 5))
        );
        assert_eq!(
            coerce_stored_timestamp("2020-01-02 03:04:05.250"),
            Some(at(2020, 1, 2, 3, 4, 5)).map(|dt| dt + chrono::Duration::milliseconds(250))
        );
        assert_eq!(
            coerce_stored_timestamp("2020-01-02"),
            Some(at(2020, 1, 2, 0, 0, 0))
        );
    }

    #[test]
    fn test_garbage_is_not_a_timestamp() {
        assert_eq!(coerce_stored_timestamp("active"), None);
        assert_eq!(coerce_stored_timestamp(""), None);
        assert_eq!(coerce_stored_timestamp("12345"), None);
    }
}
