//! Calendar helpers for work-day arithmetic.

use chrono::{Datelike, Weekday};

/// Returns true if the date is a work day (Monday through Friday).
/// Accepts anything date-like: a `NaiveDate` or a zoned `DateTime`.
pub fn is_workday<D: Datelike>(date: &D) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
