use chrono::{Months, NaiveDate};

/// Allowed plan durations, in months.
pub const MIN_DURATION_MONTHS: i32 = 1;
pub const MAX_DURATION_MONTHS: i32 = 36;

/// Returns the end date of a membership that starts on `start` and lasts
/// `duration_months` calendar months. Day-of-month overflow clamps to the
/// last day of the target month (Jan 31 + 1 month = Feb 29 in a leap year).
pub fn period_end(start: NaiveDate, duration_months: i32) -> Option<NaiveDate> {
    let months = u32::try_from(duration_months).ok()?;
    start.checked_add_months(Months::new(months))
}

pub fn is_valid_duration(duration_months: i32) -> bool {
    (MIN_DURATION_MONTHS..=MAX_DURATION_MONTHS).contains(&duration_months)
}
