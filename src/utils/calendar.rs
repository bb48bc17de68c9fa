//! Operational day boundaries

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};

/// The day `now` belongs to when days roll over at `reset_hour` local time.
///
/// Before the reset hour, the clock still counts as the previous day.
pub fn operational_day<Tz: TimeZone>(now: DateTime<Tz>, reset_hour: u32) -> NaiveDate {
    (now.naive_local() - Duration::hours(i64::from(reset_hour.min(23)))).date()
}

pub fn operational_day_now(reset_hour: u32) -> NaiveDate {
    operational_day(Local::now(), reset_hour)
}
