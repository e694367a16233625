//! Booking record model
//!
//! A single row type covers both booked and waitlisted participation: a
//! record with `waitlist_event_id == None` occupies a slot, a record with
//! `waitlist_event_id == Some(event_id)` holds a place in the waitlist.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::user::Actor;
use super::notification::NotificationFact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BookingRecord {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub is_completed: bool,
    pub waitlist_event_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn is_waitlisted(&self) -> bool {
        self.waitlist_event_id.is_some()
    }

    pub fn is_booked(&self) -> bool {
        self.waitlist_event_id.is_none()
    }

    pub fn state(&self) -> BookingState {
        if self.is_waitlisted() {
            BookingState::Waitlisted
        } else {
            BookingState::Booked
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBookingRecord {
    pub user_id: i64,
    pub event_id: i64,
    pub waitlisted: bool,
    pub created_at: DateTime<Utc>,
}

/// Per (user, event) participation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingState {
    Absent,
    Booked,
    Waitlisted,
}

impl std::fmt::Display for BookingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingState::Absent => write!(f, "absent"),
            BookingState::Booked => write!(f, "booked"),
            BookingState::Waitlisted => write!(f, "waitlisted"),
        }
    }
}

/// Join or leave request against either the booked slots or the waitlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub event_id: i64,
    pub user_id: i64,
    pub actor: Actor,
    pub join: bool,
}

impl BookingRequest {
    /// A user acting on their own participation
    pub fn own(event_id: i64, actor: Actor, join: bool) -> Self {
        Self {
            event_id,
            user_id: actor.user_id,
            actor,
            join,
        }
    }

    pub fn is_self_service(&self) -> bool {
        self.actor.user_id == self.user_id
    }
}

/// Result of a committed booking or waitlist mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub record: Option<BookingRecord>,
    pub promoted_user_id: Option<i64>,
    pub facts: Vec<NotificationFact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// 1-based FIFO position
    pub position: usize,
    pub record: BookingRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventParticipants {
    pub event_id: i64,
    pub booked: Vec<BookingRecord>,
    pub waitlist: Vec<WaitlistEntry>,
}

impl EventParticipants {
    pub fn from_records(event_id: i64, records: Vec<BookingRecord>) -> Self {
        let (waitlisted, booked): (Vec<_>, Vec<_>) =
            records.into_iter().partition(BookingRecord::is_waitlisted);

        let mut waitlisted = waitlisted;
        waitlisted.sort_by_key(|r| (r.created_at, r.id));

        let waitlist = waitlisted
            .into_iter()
            .enumerate()
            .map(|(index, record)| WaitlistEntry { position: index + 1, record })
            .collect();

        Self { event_id, booked, waitlist }
    }

    pub fn state_of(&self, user_id: i64) -> BookingState {
        if self.booked.iter().any(|r| r.user_id == user_id) {
            BookingState::Booked
        } else if self.waitlist.iter().any(|e| e.record.user_id == user_id) {
            BookingState::Waitlisted
        } else {
            BookingState::Absent
        }
    }
}
