//! Helper functions and utilities
//!
//! Time arithmetic shared by recurrence expansion and the booking engine.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, SubsecRound, TimeZone, Utc};

/// Current time truncated to the precision PostgreSQL stores.
///
/// Recurrence groups are matched on exact `created_at` equality, so every
/// timestamp the engine writes must survive a database round trip unchanged.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Midnight UTC of the given date
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Exclusive upper bound for an inclusive end date: midnight after `end`.
pub fn end_of_day_exclusive(end: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(end.date_naive()) + Duration::days(1)
}

/// Combine a calendar date with the time-of-day of a reference timestamp
pub fn at_time_of(date: NaiveDate, reference: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(reference.time()))
}

/// Weekday index with Sunday = 0 through Saturday = 6
pub fn weekday_index(timestamp: DateTime<Utc>) -> u8 {
    timestamp.weekday().num_days_from_sunday() as u8
}

/// Free slots left on an event, never negative
pub fn free_slots(total_slots: i32, booked: i64) -> i64 {
    (i64::from(total_slots) - booked).max(0)
}
