//! Reporting-period helpers shared by the canonicalizer, the rollup layer
//! and the fetch scheduler.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::error::{CoreError, CoreResult};

/// Month bucket key for a timestamp: `YYYY-MM`.
///
/// Stored denormalized on every invoice so month rollups group by string
/// equality instead of re-deriving calendar math per row.
pub fn period_key(at: &DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Enumerates every day of an inclusive range, oldest first.
///
/// A single-day range yields one entry. A reversed range is a caller bug
/// and errors instead of yielding nothing.
pub fn enumerate_days(start: NaiveDate, end: NaiveDate) -> CoreResult<Vec<NaiveDate>> {
    if start > end {
        return Err(CoreError::InvalidDateRange { start, end });
    }
    let mut days = Vec::with_capacity((end - start).num_days() as usize + 1);
    let mut cursor = start;
    while cursor <= end {
        days.push(cursor);
        cursor += Duration::days(1);
    }
    Ok(days)
}

/// UTC half-open bounds `[00:00 of day, 00:00 of next day)` for range
/// queries over stored timestamps.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default());
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_key_pads_month() {
        let at = Utc.with_ymd_and_hms(2024, 5, 3, 12, 0, 0).unwrap();
        assert_eq!(period_key(&at), "2024-05");
    }

    #[test]
    fn test_enumerate_days_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let days = enumerate_days(start, end).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], start);
        assert_eq!(days[3], end);
    }

    #[test]
    fn test_single_day_range_yields_one_day() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 30).unwrap();
        assert_eq!(enumerate_days(day, day).unwrap(), vec![day]);
    }

    #[test]
    fn test_reversed_range_is_an_error() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 5, 30).unwrap();
        let err = enumerate_days(start, end).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_day_bounds_are_half_open() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 30).unwrap();
        let (start, end) = day_bounds(day);
        assert_eq!(start.to_rfc3339(), "2024-05-30T00:00:00+00:00");
        assert_eq!((end - start).num_days(), 1);
    }
}
