//! Test context for unified test setup
//!
//! Wires a [`BookingEngine`] to a fresh in-memory store and keeps the
//! notification receiver so tests can inspect published facts.

use std::sync::Once;

use chrono::Duration;
use SlotKeeper::config::BookingConfig;
use SlotKeeper::models::{
    Actor, BookingOutcome, BookingRequest, CreateEventRequest, CreatePredefinedEventRequest, Event,
    NotificationFact, PredefinedEvent, UserEligibility,
};
use SlotKeeper::services::{BookingEngine, NotificationEmitter, NotificationReceiver};
use SlotKeeper::{MemoryEventStore, Result};

use super::test_data::{actor_for, days_ahead};

static INIT: Once = Once::new();

/// Initialize logging for tests (called once)
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

pub struct TestContext {
    pub engine: BookingEngine,
    pub store: MemoryEventStore,
    pub receiver: NotificationReceiver,
    pub config: BookingConfig,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(BookingConfig::default())
    }

    pub fn with_config(config: BookingConfig) -> Self {
        init_test_logging();

        let store = MemoryEventStore::new();
        let (emitter, receiver) = NotificationEmitter::channel();
        let engine = BookingEngine::new(std::sync::Arc::new(store.clone()), config.clone(), emitter);

        Self {
            engine,
            store,
            receiver,
            config,
        }
    }

    pub async fn add_user(&self, user: UserEligibility) -> Actor {
        self.engine
            .sync_user_facts(&user)
            .await
            .expect("Failed to sync user facts");
        actor_for(&user)
    }

    pub async fn add_users(&self, users: impl IntoIterator<Item = UserEligibility>) -> Vec<Actor> {
        let mut actors = Vec::new();
        for user in users {
            actors.push(self.add_user(user).await);
        }
        actors
    }

    /// Club event starting `days` days from now, lasting two hours
    pub async fn club_event_in(&self, days: i64, total_slots: i32) -> Event {
        let start = days_ahead(days);
        let request = CreateEventRequest::club("Club night", start, start + Duration::hours(2), total_slots);
        self.create_single(request).await
    }

    pub async fn club_event(&self, total_slots: i32) -> Event {
        self.club_event_in(3, total_slots).await
    }

    pub async fn predefined_event(&self, title: &str, course_ids: Vec<i64>) -> PredefinedEvent {
        self.engine
            .create_predefined_event(CreatePredefinedEventRequest {
                title: title.to_string(),
                course_ids,
            })
            .await
            .expect("Failed to create predefined event")
    }

    pub async fn course_event_in(&self, predefined_event_id: i64, days: i64, total_slots: i32) -> Event {
        let start = days_ahead(days);
        let request = CreateEventRequest::course(predefined_event_id, start, start + Duration::hours(2), total_slots);
        self.create_single(request).await
    }

    pub async fn create_single(&self, request: CreateEventRequest) -> Event {
        let mut events = self.engine.create_event(request).await.expect("Failed to create event");
        assert_eq!(events.len(), 1, "expected a single occurrence");
        events.remove(0)
    }

    pub async fn book(&self, event_id: i64, actor: Actor) -> Result<BookingOutcome> {
        self.engine.set_booking(BookingRequest::own(event_id, actor, true)).await
    }

    pub async fn cancel(&self, event_id: i64, actor: Actor) -> Result<BookingOutcome> {
        self.engine.set_booking(BookingRequest::own(event_id, actor, false)).await
    }

    pub async fn join_waitlist(&self, event_id: i64, actor: Actor) -> Result<BookingOutcome> {
        self.engine.set_waitlist(BookingRequest::own(event_id, actor, true)).await
    }

    pub async fn leave_waitlist(&self, event_id: i64, actor: Actor) -> Result<BookingOutcome> {
        self.engine.set_waitlist(BookingRequest::own(event_id, actor, false)).await
    }

    /// Booked user ids of an event, sorted
    pub async fn booked_users(&self, event_id: i64) -> Vec<i64> {
        let participants = self
            .engine
            .event_participants(event_id)
            .await
            .expect("Failed to list participants");
        let mut users: Vec<i64> = participants.booked.iter().map(|r| r.user_id).collect();
        users.sort_unstable();
        users
    }

    /// Waitlisted user ids of an event in promotion order
    pub async fn waitlisted_users(&self, event_id: i64) -> Vec<i64> {
        let participants = self
            .engine
            .event_participants(event_id)
            .await
            .expect("Failed to list participants");
        participants.waitlist.iter().map(|e| e.record.user_id).collect()
    }

    /// Facts published so far that have not been drained yet
    pub fn drain_facts(&mut self) -> Vec<NotificationFact> {
        let mut facts = Vec::new();
        while let Ok(fact) = self.receiver.try_recv() {
            facts.push(fact);
        }
        facts
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
