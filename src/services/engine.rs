//! Booking engine
//!
//! Entry point the surrounding application calls. Each mutating operation
//! opens exactly one unit of work, runs it under the configured transaction
//! timeout, commits, and only then publishes the resulting notification
//! facts. A timed-out or failed attempt is dropped uncommitted, which rolls
//! back everything it wrote.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::config::BookingConfig;
use crate::database::EventStore;
use crate::models::{
    BookingOutcome, BookingRecord, BookingRequest, CreateEventRequest, CreatePredefinedEventRequest, Event,
    EventAvailability, EventFilter, EventParticipants, PredefinedEvent, RecurrenceRule, UpdateEventRequest,
    UserEligibility,
};
use crate::services::coordinator::{EventChange, EventMutationCoordinator};
use crate::services::ledger::CapacityLedger;
use crate::services::notification::NotificationEmitter;
use crate::services::recurrence::Occurrence;
use crate::services::sweeper;
use crate::utils::errors::{Result, SlotKeeperError};
use crate::utils::helpers::{free_slots, now_micros};
use crate::utils::logging::{log_booking_rejected, log_transaction_retry};

#[derive(Clone)]
pub struct BookingEngine {
    store: Arc<dyn EventStore>,
    config: BookingConfig,
    ledger: CapacityLedger,
    coordinator: EventMutationCoordinator,
    emitter: NotificationEmitter,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn EventStore>, config: BookingConfig, emitter: NotificationEmitter) -> Self {
        Self {
            ledger: CapacityLedger::new(&config),
            coordinator: EventMutationCoordinator::new(&config),
            store,
            config,
            emitter,
        }
    }

    pub fn store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.store)
    }

    pub fn emitter(&self) -> &NotificationEmitter {
        &self.emitter
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Create a single event or a whole recurrence group
    #[instrument(skip(self, request), fields(is_club = request.is_club, rule = ?request.recurrence_rule))]
    pub async fn create_event(&self, request: CreateEventRequest) -> Result<Vec<Event>> {
        let created_at = now_micros();
        let occurrences = self.coordinator.validate_create(&request, created_at)?;

        let request = &request;
        let occurrences = occurrences.as_slice();
        self.run_with_retry("create_event", move || self.create_event_once(request, occurrences, created_at))
            .await
    }

    /// Apply a capacity and window patch to one event
    #[instrument(skip(self, patch))]
    pub async fn update_event(&self, event_id: i64, patch: UpdateEventRequest) -> Result<EventChange> {
        self.coordinator.validate_update(&patch)?;

        let patch = &patch;
        let change = self
            .run_with_retry("update_event", move || self.update_event_once(event_id, patch))
            .await?;

        self.emitter.publish_all(&change.facts);
        Ok(change)
    }

    pub async fn update_capacity(&self, event_id: i64, total_slots: i32) -> Result<EventChange> {
        self.update_event(event_id, UpdateEventRequest::capacity(total_slots)).await
    }

    /// Delete one event, or with `rule` the rest of its recurrence group
    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: i64, rule: Option<RecurrenceRule>) -> Result<u64> {
        self.run_with_retry("delete_event", move || self.delete_event_once(event_id, rule))
            .await
    }

    /// Book (`join = true`) or cancel a booked slot
    #[instrument(skip(self, request), fields(event_id = request.event_id, user_id = request.user_id, join = request.join))]
    pub async fn set_booking(&self, request: BookingRequest) -> Result<BookingOutcome> {
        let now = now_micros();
        let req = &request;
        let result = self
            .run_with_retry("set_booking", move || self.set_booking_once(req, now))
            .await;
        self.finish(&request, result)
    }

    /// Join (`join = true`) or leave the waitlist
    #[instrument(skip(self, request), fields(event_id = request.event_id, user_id = request.user_id, join = request.join))]
    pub async fn set_waitlist(&self, request: BookingRequest) -> Result<BookingOutcome> {
        let now = now_micros();
        let req = &request;
        let result = self
            .run_with_retry("set_waitlist", move || self.set_waitlist_once(req, now))
            .await;
        self.finish(&request, result)
    }

    pub async fn create_predefined_event(&self, request: CreatePredefinedEventRequest) -> Result<PredefinedEvent> {
        let request = &request;
        self.run_with_retry("create_predefined_event", move || self.create_predefined_once(request))
            .await
    }

    /// Non-hidden events for a time window
    pub async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.store.list_events(filter).await
    }

    /// Store the eligibility facts supplied by user management
    pub async fn sync_user_facts(&self, facts: &UserEligibility) -> Result<()> {
        self.store.upsert_user(facts).await?;
        debug!(user_id = facts.user_id, role = ?facts.role, "User eligibility facts synced");
        Ok(())
    }

    pub async fn event_availability(&self, event_id: i64) -> Result<EventAvailability> {
        let event = self.require_event(event_id).await?;
        let records = self.store.event_records(event_id).await?;

        let waitlisted = records.iter().filter(|r| r.is_waitlisted()).count() as i64;
        let booked = records.len() as i64 - waitlisted;

        Ok(EventAvailability {
            event_id,
            total_slots: event.total_slots,
            booked,
            waitlisted,
            free_slots: free_slots(event.total_slots, booked),
            enable_booking: event.enable_booking,
        })
    }

    /// Booked users and the waitlist in promotion order
    pub async fn event_participants(&self, event_id: i64) -> Result<EventParticipants> {
        self.require_event(event_id).await?;
        let records = self.store.event_records(event_id).await?;
        Ok(EventParticipants::from_records(event_id, records))
    }

    pub async fn user_bookings(&self, user_id: i64, include_completed: bool) -> Result<Vec<BookingRecord>> {
        self.store.user_records(user_id, include_completed).await
    }

    /// 1-based waitlist position, `None` when the user is not waitlisted
    pub async fn waitlist_position(&self, event_id: i64, user_id: i64) -> Result<Option<usize>> {
        let participants = self.event_participants(event_id).await?;
        Ok(participants
            .waitlist
            .iter()
            .find(|entry| entry.record.user_id == user_id)
            .map(|entry| entry.position))
    }

    /// Mark records of events that ended before `now` as completed
    pub async fn sweep_completed(&self, now: DateTime<Utc>) -> Result<u64> {
        sweeper::sweep_completed(self.store.as_ref(), now).await
    }

    async fn create_event_once(
        &self,
        request: &CreateEventRequest,
        occurrences: &[Occurrence],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let mut uow = self.store.begin().await?;
        let events = self
            .coordinator
            .create_events(uow.as_mut(), request, occurrences, created_at)
            .await?;
        uow.commit().await?;
        Ok(events)
    }

    async fn update_event_once(&self, event_id: i64, patch: &UpdateEventRequest) -> Result<EventChange> {
        let mut uow = self.store.begin().await?;
        let change = self.coordinator.update_event(uow.as_mut(), event_id, patch).await?;
        uow.commit().await?;
        Ok(change)
    }

    async fn delete_event_once(&self, event_id: i64, rule: Option<RecurrenceRule>) -> Result<u64> {
        let mut uow = self.store.begin().await?;
        let deleted = self.coordinator.delete_event(uow.as_mut(), event_id, rule).await?;
        uow.commit().await?;
        Ok(deleted)
    }

    async fn set_booking_once(&self, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        let mut uow = self.store.begin().await?;
        let outcome = self.ledger.set_booking(uow.as_mut(), request, now).await?;
        uow.commit().await?;
        Ok(outcome)
    }

    async fn set_waitlist_once(&self, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        let mut uow = self.store.begin().await?;
        let outcome = self.ledger.set_waitlist(uow.as_mut(), request, now).await?;
        uow.commit().await?;
        Ok(outcome)
    }

    async fn create_predefined_once(&self, request: &CreatePredefinedEventRequest) -> Result<PredefinedEvent> {
        let mut uow = self.store.begin().await?;
        let predefined = self.coordinator.create_predefined_event(uow.as_mut(), request).await?;
        uow.commit().await?;
        Ok(predefined)
    }

    async fn require_event(&self, event_id: i64) -> Result<Event> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or(SlotKeeperError::EventNotFound { event_id })
    }

    fn finish(&self, request: &BookingRequest, result: Result<BookingOutcome>) -> Result<BookingOutcome> {
        match &result {
            Ok(outcome) => {
                self.emitter.publish_all(&outcome.facts);
            }
            Err(e) if e.conflict().is_some() => {
                log_booking_rejected(request.event_id, request.user_id, e.code());
            }
            Err(e) => {
                warn!(
                    event_id = request.event_id,
                    user_id = request.user_id,
                    severity = %e.severity(),
                    error = %e,
                    "Booking request failed"
                );
            }
        }
        result
    }

    /// Run one attempt under the transaction timeout, retrying transient
    /// failures up to `serialization_retries` times.
    async fn run_with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.config.transaction_timeout();
        let mut retries = 0u32;

        loop {
            let result = match tokio::time::timeout(timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(SlotKeeperError::Transient(format!(
                    "{} timed out after {}ms",
                    operation, self.config.transaction_timeout_ms
                ))),
            };

            match result {
                Err(e) if e.is_recoverable() && retries < self.config.serialization_retries => {
                    retries += 1;
                    log_transaction_retry(operation, retries, &e.to_string());
                }
                other => return other,
            }
        }
    }
}
