//! Event model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Recurrence rule stored on every occurrence of a recurrence group.
///
/// A single (non-recurring) event carries no rule at all, so "none" is
/// modelled as `Option::None` wherever a rule appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recurrence_rule", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceRule {
    Daily,
    Weekly,
    Monthly,
    Annually,
    Weekdays,
    CustomDays,
    CustomDates,
}

impl RecurrenceRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceRule::Daily => "daily",
            RecurrenceRule::Weekly => "weekly",
            RecurrenceRule::Monthly => "monthly",
            RecurrenceRule::Annually => "annually",
            RecurrenceRule::Weekdays => "weekdays",
            RecurrenceRule::CustomDays => "custom_days",
            RecurrenceRule::CustomDates => "custom_dates",
        }
    }
}

impl std::fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_slots: i32,
    pub is_club: bool,
    pub enable_booking: bool,
    pub predefined_event_id: Option<i64>,
    pub recurrence_rule: Option<RecurrenceRule>,
    pub recurrence_end: Option<DateTime<Utc>>,
    pub is_hidden: bool,
    /// Shared by every occurrence produced from one creation request.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time < now
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }
}

/// Template shared by course-scoped (non-club) events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PredefinedEvent {
    pub id: i64,
    pub title: String,
    pub course_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePredefinedEventRequest {
    pub title: String,
    #[serde(default)]
    pub course_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_slots: i32,
    pub is_club: bool,
    #[serde(default = "default_enable_booking")]
    pub enable_booking: bool,
    pub predefined_event_id: Option<i64>,
    pub recurrence_rule: Option<RecurrenceRule>,
    pub recurrence_end: Option<DateTime<Utc>>,
    /// Weekday indices, 0 = Sunday through 6 = Saturday.
    #[serde(default)]
    pub repeat_days: Vec<u8>,
    #[serde(default)]
    pub repeat_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub is_hidden: bool,
}

fn default_enable_booking() -> bool {
    true
}

impl CreateEventRequest {
    /// Single club event without recurrence
    pub fn club(title: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>, total_slots: i32) -> Self {
        Self {
            title: Some(title.to_string()),
            description: None,
            start_time,
            end_time,
            total_slots,
            is_club: true,
            enable_booking: true,
            predefined_event_id: None,
            recurrence_rule: None,
            recurrence_end: None,
            repeat_days: Vec::new(),
            repeat_dates: Vec::new(),
            is_hidden: false,
        }
    }

    /// Single course event derived from a predefined template
    pub fn course(predefined_event_id: i64, start_time: DateTime<Utc>, end_time: DateTime<Utc>, total_slots: i32) -> Self {
        Self {
            title: None,
            description: None,
            start_time,
            end_time,
            total_slots,
            is_club: false,
            enable_booking: true,
            predefined_event_id: Some(predefined_event_id),
            recurrence_rule: None,
            recurrence_end: None,
            repeat_days: Vec::new(),
            repeat_dates: Vec::new(),
            is_hidden: false,
        }
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule, recurrence_end: Option<DateTime<Utc>>) -> Self {
        self.recurrence_rule = Some(rule);
        self.recurrence_end = recurrence_end;
        self
    }

    pub fn with_repeat_days(mut self, days: Vec<u8>) -> Self {
        self.repeat_days = days;
        self
    }

    pub fn with_repeat_dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.repeat_dates = dates;
        self
    }

    pub fn with_booking_enabled(mut self, enable_booking: bool) -> Self {
        self.enable_booking = enable_booking;
        self
    }
}

/// Row handed to the store for insertion; one per expanded occurrence.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_slots: i32,
    pub is_club: bool,
    pub enable_booking: bool,
    pub predefined_event_id: Option<i64>,
    pub recurrence_rule: Option<RecurrenceRule>,
    pub recurrence_end: Option<DateTime<Utc>>,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial update of an event's capacity, window and descriptive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_slots: Option<i32>,
    pub enable_booking: Option<bool>,
}

impl UpdateEventRequest {
    pub fn capacity(total_slots: i32) -> Self {
        Self {
            total_slots: Some(total_slots),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.total_slots.is_none()
            && self.enable_booking.is_none()
    }
}

/// Read-side filter for listing events; hidden events are never returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub is_club: Option<bool>,
    pub predefined_event_id: Option<i64>,
    pub limit: Option<i64>,
}

impl EventFilter {
    pub fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        !event.is_hidden
            && self.from.map_or(true, |from| event.end_time >= from)
            && self.to.map_or(true, |to| event.start_time <= to)
            && self.is_club.map_or(true, |is_club| event.is_club == is_club)
            && self
                .predefined_event_id
                .map_or(true, |id| event.predefined_event_id == Some(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAvailability {
    pub event_id: i64,
    pub total_slots: i32,
    pub booked: i64,
    pub waitlisted: i64,
    pub free_slots: i64,
    pub enable_booking: bool,
}
