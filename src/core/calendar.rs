//! Calendar conventions shared by curves, legs and positions.
//!
//! All ranges are half-open `[start, end)` and measured in calendar days.

use chrono::{Datelike, NaiveDate, Weekday};

/// Calendar days from `start` to `end` (negative if `end` precedes `start`).
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Overlap of two half-open ranges, or `None` if they share no day.
pub fn overlap(
    a: (NaiveDate, NaiveDate),
    b: (NaiveDate, NaiveDate),
) -> Option<(NaiveDate, NaiveDate)> {
    let start = a.0.max(b.0);
    let end = a.1.min(b.1);
    (start < end).then_some((start, end))
}

/// Third Wednesday of the month: the LME monthly prompt date.
///
/// # Examples
///
/// ```
/// use carry_engine::core::calendar::third_wednesday;
/// use chrono::NaiveDate;
///
/// assert_eq!(
///     third_wednesday(2025, 4),
///     NaiveDate::from_ymd_opt(2025, 4, 16),
/// );
/// ```
pub fn third_wednesday(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Wed, 3)
}

/// Monthly prompt dates for a year, January to December.
pub fn prompt_dates(year: i32) -> Vec<NaiveDate> {
    (1..=12).filter_map(|m| third_wednesday(year, m)).collect()
}

/// Prompt dates falling within `[start, end)`.
pub fn prompt_dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    (start.year()..=end.year())
        .flat_map(prompt_dates)
        .filter(|d| *d >= start && *d < end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_days_between_is_calendar_days() {
        assert_eq!(days_between(d(2025, 4, 1), d(2025, 7, 1)), 91);
        assert_eq!(days_between(d(2025, 4, 1), d(2025, 4, 1)), 0);
        assert_eq!(days_between(d(2025, 4, 2), d(2025, 4, 1)), -1);
    }

    #[test]
    fn test_overlap() {
        let a = (d(2025, 4, 1), d(2025, 7, 1));
        let b = (d(2025, 5, 1), d(2025, 8, 1));
        assert_eq!(overlap(a, b), Some((d(2025, 5, 1), d(2025, 7, 1))));
        assert_eq!(overlap(b, a), overlap(a, b));

        // Touching ranges share no day.
        let c = (d(2025, 7, 1), d(2025, 9, 1));
        assert_eq!(overlap(a, c), None);
    }

    #[test]
    fn test_third_wednesdays() {
        assert_eq!(third_wednesday(2025, 5), Some(d(2025, 5, 21)));
        assert_eq!(third_wednesday(2025, 6), Some(d(2025, 6, 18)));
        let prompts = prompt_dates(2025);
        assert_eq!(prompts.len(), 12);
        assert!(prompts.iter().all(|p| p.weekday() == Weekday::Wed));
    }

    #[test]
    fn test_prompt_dates_between_spans_years() {
        let prompts = prompt_dates_between(d(2025, 11, 1), d(2026, 2, 1));
        assert_eq!(prompts, vec![d(2025, 11, 19), d(2025, 12, 17), d(2026, 1, 21)]);
    }
}
