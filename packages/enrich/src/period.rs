//! Lookback window generation.

use chrono::NaiveDate;
use crime_enrich_crime_models::Period;

/// Returns the `months` calendar months ending with the month of `today`,
/// oldest first.
#[must_use]
pub fn recent_periods(months: usize, today: NaiveDate) -> Vec<Period> {
    let mut periods = Vec::with_capacity(months);
    let mut period = Period::from_date(&today);
    for _ in 0..months {
        periods.push(period);
        period = period.previous();
    }
    periods.reverse();
    periods
}

/// [`recent_periods`] anchored on the current UTC date.
#[must_use]
pub fn current_window(months: usize) -> Vec<Period> {
    recent_periods(months, chrono::Utc::now().date_naive())
}
