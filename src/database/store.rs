//! Store abstractions used by the booking engine
//!
//! The engine never touches a connection directly. Reads that need no
//! isolation go through [`EventStore`]; every mutation runs inside a
//! [`UnitOfWork`] obtained from [`EventStore::begin`] and only becomes
//! visible once [`UnitOfWork::commit`] succeeds. Dropping a unit of work
//! without committing discards all of its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    BookingRecord, CreatePredefinedEventRequest, Event, EventFilter, NewBookingRecord, NewEvent,
    PredefinedEvent, RecurrenceRule, UpdateEventRequest, UserEligibility,
};
use crate::utils::errors::Result;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Open a serializable unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    async fn find_event(&self, event_id: i64) -> Result<Option<Event>>;

    /// Non-hidden events matching the filter, ordered by start time
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    async fn find_predefined_event(&self, predefined_event_id: i64) -> Result<Option<PredefinedEvent>>;

    /// All booked and waitlisted records of an event
    async fn event_records(&self, event_id: i64) -> Result<Vec<BookingRecord>>;

    async fn user_records(&self, user_id: i64, include_completed: bool) -> Result<Vec<BookingRecord>>;

    async fn find_user(&self, user_id: i64) -> Result<Option<UserEligibility>>;

    /// Record eligibility facts supplied by the user management collaborator
    async fn upsert_user(&self, facts: &UserEligibility) -> Result<()>;

    /// Mark records of events that ended before `cutoff` as completed
    async fn mark_completed(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Transaction-scoped access to events and booking records.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read the event and hold it against concurrent mutation until commit
    async fn lock_event(&mut self, event_id: i64) -> Result<Option<Event>>;

    /// Read the user's eligibility facts and hold the row until commit
    async fn lock_user(&mut self, user_id: i64) -> Result<Option<UserEligibility>>;

    async fn predefined_event(&mut self, predefined_event_id: i64) -> Result<Option<PredefinedEvent>>;

    async fn find_record(&mut self, event_id: i64, user_id: i64) -> Result<Option<BookingRecord>>;

    async fn count_booked(&mut self, event_id: i64) -> Result<i64>;

    /// Non-completed booked or waitlisted records the user holds on club events
    async fn count_active_club_records(&mut self, user_id: i64) -> Result<i64>;

    /// Whether the user holds a booked record (completed or not) on any
    /// occurrence of the predefined event
    async fn has_predefined_booking(&mut self, user_id: i64, predefined_event_id: i64) -> Result<bool>;

    async fn insert_record(&mut self, record: NewBookingRecord) -> Result<BookingRecord>;

    async fn delete_record(&mut self, record_id: i64) -> Result<()>;

    /// Waitlisted records of the event ordered by `(created_at, id)`
    async fn waitlist(&mut self, event_id: i64) -> Result<Vec<BookingRecord>>;

    /// Clear the waitlist marker, turning the record into a booking
    async fn mark_booked(&mut self, record_id: i64) -> Result<BookingRecord>;

    async fn insert_events(&mut self, events: Vec<NewEvent>) -> Result<Vec<Event>>;

    async fn update_event(&mut self, event_id: i64, patch: &UpdateEventRequest) -> Result<Event>;

    /// Delete one event and its booking records
    async fn delete_event(&mut self, event_id: i64) -> Result<u64>;

    /// Delete every event of a recurrence group starting at or after `from_start`
    async fn delete_recurrence_group(
        &mut self,
        rule: RecurrenceRule,
        created_at: DateTime<Utc>,
        from_start: DateTime<Utc>,
    ) -> Result<u64>;

    async fn insert_predefined_event(&mut self, request: &CreatePredefinedEventRequest) -> Result<PredefinedEvent>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
