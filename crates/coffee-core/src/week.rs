//! Week identity. A week is named by its Monday.

use crate::error::{CoffeeError, Result};
use chrono::{Datelike, Days, NaiveDate, Utc};

/// Monday of the week containing `date`. Sunday belongs to the week that
/// started six days earlier.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().number_from_monday() - 1;
    date - Days::new(u64::from(offset))
}

/// Monday of the current UTC week.
pub fn current_week_start() -> NaiveDate {
    week_start(Utc::now().date_naive())
}

/// Monday of the week before the week starting at `monday`.
pub fn previous_week(monday: NaiveDate) -> NaiveDate {
    week_start(monday) - Days::new(7)
}

/// Parse a `--week-start` override. Non-Monday dates are normalised to the
/// Monday of their week.
pub fn parse_week_start(s: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| CoffeeError::InvalidWeekStart(s.to_string()))?;
    Ok(week_start(date))
}

/// Resolve an optional override to a Monday, defaulting to the current week.
pub fn resolve(override_date: Option<NaiveDate>) -> NaiveDate {
    override_date.map(week_start).unwrap_or_else(current_week_start)
}
