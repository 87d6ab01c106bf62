//! Lower bound of the "recently completed" window.

use chrono::{Duration, Local, NaiveDate};

/// Default window size in days.
pub const DEFAULT_DAYS_BACK: u32 = 14;

/// `today` minus `days_back` days.
pub fn window_start(today: NaiveDate, days_back: u32) -> NaiveDate {
    today - Duration::days(i64::from(days_back))
}

/// Window start relative to the local calendar date, formatted `YYYY-MM-DD`.
pub fn window_start_from_now(days_back: u32) -> String {
    format_window(window_start(Local::now().date_naive(), days_back))
}

pub(crate) fn format_window(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
