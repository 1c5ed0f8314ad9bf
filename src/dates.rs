//! ISO-8601 boundary parsing and inclusive day windows.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer};

use crate::error::ApiError;

pub const INVALID_DATE: &str = "Invalid date format, expected ISO-8601";

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse a date boundary down to its calendar day.
///
/// Accepts `YYYY-MM-DD`, naive date-times with optional fractional seconds
/// and RFC 3339 timestamps (converted to UTC first).
pub fn parse_boundary(raw: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc).date_naive());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt.date());
        }
    }

    Err(ApiError::validation(INVALID_DATE))
}

/// Serde adapter for optional day fields that may arrive as full timestamps,
/// e.g. `"2025-03-01T00:00:00.000Z"` from browser clients.
pub fn deserialize_optional_day<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .as_deref()
        .map(parse_boundary)
        .transpose()
        .map_err(de::Error::custom)
}

/// The window of identical length that ends the day before `start`.
pub fn previous_period(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let length = end - start;
    let prev_end = start
        .checked_sub_signed(Duration::days(1))
        .unwrap_or(NaiveDate::MIN);
    let prev_start = prev_end.checked_sub_signed(length).unwrap_or(NaiveDate::MIN);
    (prev_start, prev_end)
}

/// Inclusive `[start, end]` range of days; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ApiError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ApiError::validation("start_date must not be after end_date"));
            }
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ApiError> {
        let start = start.filter(|s| !s.trim().is_empty()).map(parse_boundary).transpose()?;
        let end = end.filter(|s| !s.trim().is_empty()).map(parse_boundary).transpose()?;
        Self::new(start, end)
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    /// Preceding window; only defined when both bounds are set.
    pub fn previous(&self) -> Option<DateWindow> {
        let (start, end) = (self.start?, self.end?);
        let (prev_start, prev_end) = previous_period(start, end);
        Some(DateWindow {
            start: Some(prev_start),
            end: Some(prev_end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_plain_dates_and_timestamps() {
        assert_eq!(parse_boundary("2025-03-07").unwrap(), day(2025, 3, 7));
        assert_eq!(parse_boundary("2025-03-07T08:15:00").unwrap(), day(2025, 3, 7));
        assert_eq!(parse_boundary("2025-03-07T08:15:00.123456").unwrap(), day(2025, 3, 7));
        assert_eq!(parse_boundary("2025-03-07 23:59:59").unwrap(), day(2025, 3, 7));
        assert_eq!(parse_boundary("2025-03-07T10:30").unwrap(), day(2025, 3, 7));
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        assert_eq!(parse_boundary("2025-03-07T23:30:00-02:00").unwrap(), day(2025, 3, 8));
        assert_eq!(parse_boundary("2025-03-07T12:00:00Z").unwrap(), day(2025, 3, 7));
    }

    #[test]
    fn garbage_is_a_validation_error() {
        for raw in ["invalid-date", "2025-13-01", "07/03/2025", ""] {
            match parse_boundary(raw) {
                Err(ApiError::Validation(msg)) => assert_eq!(msg, INVALID_DATE),
                other => panic!("expected validation error for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn previous_period_has_same_length_and_does_not_overlap() {
        let (start, end) = (day(2025, 3, 10), day(2025, 3, 16));
        let (prev_start, prev_end) = previous_period(start, end);

        assert_eq!(prev_end, day(2025, 3, 9));
        assert_eq!(prev_start, day(2025, 3, 3));
        assert_eq!(prev_end - prev_start, end - start);
        assert!(prev_end < start);
    }

    #[test]
    fn single_day_window_maps_to_previous_day() {
        let d = day(2025, 1, 1);
        assert_eq!(previous_period(d, d), (day(2024, 12, 31), day(2024, 12, 31)));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = DateWindow::new(Some(day(2025, 3, 1)), Some(day(2025, 3, 5))).unwrap();
        assert!(window.contains(day(2025, 3, 1)));
        assert!(window.contains(day(2025, 3, 5)));
        assert!(!window.contains(day(2025, 2, 28)));
        assert!(!window.contains(day(2025, 3, 6)));

        let open = DateWindow::parse(Some("2025-03-01"), None).unwrap();
        assert!(open.contains(day(2099, 1, 1)));
        assert!(open.previous().is_none());
    }

    #[test]
    fn reversed_window_is_rejected() {
        assert!(matches!(
            DateWindow::parse(Some("2025-03-05"), Some("2025-03-01")),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn blank_parameters_are_ignored() {
        assert_eq!(DateWindow::parse(Some(""), Some("  ")).unwrap(), DateWindow::unbounded());
    }
}
