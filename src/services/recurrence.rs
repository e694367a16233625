//! Recurrence expansion
//!
//! Turns one creation request into the ordered list of concrete occurrences
//! it describes. Pure: the caller supplies `now`, nothing is persisted here.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BookingConfig;
use crate::models::{CreateEventRequest, RecurrenceRule};
use crate::utils::errors::ValidationError;
use crate::utils::helpers::{at_time_of, end_of_day_exclusive, weekday_index};

const WORKING_DAYS: [u8; 5] = [1, 2, 3, 4, 5];

/// One concrete scheduled instance of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Expansion input, borrowed from a creation request
#[derive(Debug, Clone)]
pub struct RecurrenceRequest<'a> {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rule: Option<RecurrenceRule>,
    pub recurrence_end: Option<DateTime<Utc>>,
    pub repeat_days: &'a [u8],
    pub repeat_dates: &'a [NaiveDate],
}

impl<'a> From<&'a CreateEventRequest> for RecurrenceRequest<'a> {
    fn from(request: &'a CreateEventRequest) -> Self {
        Self {
            start_time: request.start_time,
            end_time: request.end_time,
            rule: request.recurrence_rule,
            recurrence_end: request.recurrence_end,
            repeat_days: &request.repeat_days,
            repeat_dates: &request.repeat_dates,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecurrenceExpander {
    default_horizon: Duration,
    annual_horizon_years: u32,
    max_occurrences: usize,
}

impl Default for RecurrenceExpander {
    fn default() -> Self {
        Self::from_config(&BookingConfig::default())
    }
}

impl RecurrenceExpander {
    pub fn new(default_horizon_days: i64, annual_horizon_years: u32, max_occurrences: usize) -> Self {
        Self {
            default_horizon: Duration::days(default_horizon_days),
            annual_horizon_years,
            max_occurrences,
        }
    }

    pub fn from_config(config: &BookingConfig) -> Self {
        Self::new(config.default_horizon_days, config.annual_horizon_years, config.max_occurrences)
    }

    /// Expand a request into its occurrences, earliest first.
    pub fn expand(&self, request: &RecurrenceRequest<'_>, now: DateTime<Utc>) -> Result<Vec<Occurrence>, ValidationError> {
        if request.end_time <= request.start_time {
            return Err(ValidationError::EndBeforeStart);
        }
        let duration = request.end_time - request.start_time;

        let repeat_dates = self.sorted_dates(request)?;
        let base_start = match repeat_dates.first() {
            Some(first) if request.rule == Some(RecurrenceRule::CustomDates) => at_time_of(*first, request.start_time),
            _ => request.start_time,
        };

        if base_start <= now {
            return Err(ValidationError::StartDateMustBeInTheFuture);
        }

        let Some(rule) = request.rule else {
            return Ok(vec![Occurrence { start_time: base_start, end_time: base_start + duration }]);
        };

        let limit = self.horizon(rule, base_start, request.recurrence_end);
        if limit <= base_start {
            return Err(ValidationError::RecurrenceEndBeforeStart);
        }

        // One past the cap is enough to reject, so a far-off end stays cheap
        let cap = self.max_occurrences.saturating_add(1);
        let starts = match rule {
            RecurrenceRule::Daily => stepped(base_start, limit, cap, |k| base_start.checked_add_signed(Duration::days(k as i64))),
            RecurrenceRule::Weekly => stepped(base_start, limit, cap, |k| base_start.checked_add_signed(Duration::weeks(k as i64))),
            RecurrenceRule::Monthly => stepped(base_start, limit, cap, |k| base_start.checked_add_months(Months::new(k))),
            RecurrenceRule::Annually => stepped(base_start, limit, cap, |k| base_start.checked_add_months(Months::new(k.saturating_mul(12)))),
            RecurrenceRule::Weekdays => on_weekdays(base_start, limit, cap, &WORKING_DAYS.into_iter().collect::<BTreeSet<u8>>()),
            RecurrenceRule::CustomDays => {
                let days = self.weekday_set(request)?;
                on_weekdays(base_start, limit, cap, &days)
            }
            RecurrenceRule::CustomDates => repeat_dates
                .iter()
                .map(|date| at_time_of(*date, request.start_time))
                .filter(|start| *start < limit)
                .collect(),
        };

        if starts.is_empty() {
            return Err(ValidationError::NoOccurrences);
        }
        if starts.len() > self.max_occurrences {
            return Err(ValidationError::TooManyOccurrences(self.max_occurrences));
        }

        Ok(starts
            .into_iter()
            .map(|start_time| Occurrence { start_time, end_time: start_time + duration })
            .collect())
    }

    /// Exclusive end of the expansion window
    fn horizon(&self, rule: RecurrenceRule, base_start: DateTime<Utc>, recurrence_end: Option<DateTime<Utc>>) -> DateTime<Utc> {
        if let Some(end) = recurrence_end {
            return end_of_day_exclusive(end);
        }

        match rule {
            RecurrenceRule::Annually => base_start
                .checked_add_months(Months::new(self.annual_horizon_years.saturating_mul(12)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            _ => base_start + self.default_horizon,
        }
    }

    fn sorted_dates(&self, request: &RecurrenceRequest<'_>) -> Result<Vec<NaiveDate>, ValidationError> {
        if request.rule != Some(RecurrenceRule::CustomDates) {
            return Ok(Vec::new());
        }
        if request.repeat_dates.is_empty() {
            return Err(ValidationError::MissingRepeatDates(RecurrenceRule::CustomDates.to_string()));
        }

        let dates: BTreeSet<NaiveDate> = request.repeat_dates.iter().copied().collect();
        Ok(dates.into_iter().collect())
    }

    fn weekday_set(&self, request: &RecurrenceRequest<'_>) -> Result<BTreeSet<u8>, ValidationError> {
        if request.repeat_days.is_empty() {
            return Err(ValidationError::MissingRepeatDays(RecurrenceRule::CustomDays.to_string()));
        }
        if let Some(invalid) = request.repeat_days.iter().find(|day| **day > 6) {
            return Err(ValidationError::InvalidWeekday(*invalid));
        }
        Ok(request.repeat_days.iter().copied().collect())
    }
}

/// Starts produced by `step(k)` for k = 0, 1, 2, ... while before `limit`,
/// at most `cap` of them.
///
/// Each start is computed from the base rather than the previous start so
/// month-end clamping (Jan 31 -> Feb 28) does not drift later occurrences.
fn stepped<F>(base_start: DateTime<Utc>, limit: DateTime<Utc>, cap: usize, step: F) -> Vec<DateTime<Utc>>
where
    F: Fn(u32) -> Option<DateTime<Utc>>,
{
    let mut starts = vec![base_start];
    for k in 1.. {
        if starts.len() >= cap {
            break;
        }
        match step(k) {
            Some(start) if start < limit => starts.push(start),
            _ => break,
        }
    }
    starts
}

fn on_weekdays(base_start: DateTime<Utc>, limit: DateTime<Utc>, cap: usize, days: &BTreeSet<u8>) -> Vec<DateTime<Utc>> {
    let mut starts = Vec::new();
    let mut cursor = base_start;
    while cursor < limit && starts.len() < cap {
        if days.contains(&weekday_index(cursor)) {
            starts.push(cursor);
        }
        cursor += Duration::days(1);
    }
    starts
}
