//! In-memory event store
//!
//! A unit of work holds the store-wide mutex for its whole lifetime and
//! writes to a staged copy of the state, which replaces the live state only
//! on commit. That makes every unit of work trivially serializable, at the
//! cost of running them one at a time. Used for embedding and tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::store::{EventStore, UnitOfWork};
use crate::models::{
    BookingRecord, CreatePredefinedEventRequest, Event, EventFilter, NewBookingRecord, NewEvent,
    PredefinedEvent, RecurrenceRule, UpdateEventRequest, UserEligibility,
};
use crate::utils::errors::{BookingConflict, Result, SlotKeeperError};
use crate::utils::helpers::now_micros;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    events: BTreeMap<i64, Event>,
    /// Record ids owned by each event
    event_records: HashMap<i64, BTreeSet<i64>>,
    records: BTreeMap<i64, BookingRecord>,
    users: HashMap<i64, UserEligibility>,
    predefined: BTreeMap<i64, PredefinedEvent>,
    next_event_id: i64,
    next_record_id: i64,
    next_predefined_id: i64,
}

impl MemoryState {
    fn records_of(&self, event_id: i64) -> impl Iterator<Item = &BookingRecord> + '_ {
        self.event_records
            .get(&event_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
    }

    fn find_record(&self, event_id: i64, user_id: i64) -> Option<&BookingRecord> {
        self.records_of(event_id).find(|r| r.user_id == user_id)
    }

    fn remove_event(&mut self, event_id: i64) -> bool {
        if self.events.remove(&event_id).is_none() {
            return false;
        }
        if let Some(ids) = self.event_records.remove(&event_id) {
            for id in ids {
                self.records.remove(&id);
            }
        }
        true
    }

    fn sorted_records(records: impl Iterator<Item = BookingRecord>) -> Vec<BookingRecord> {
        let mut records: Vec<_> = records.collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        records
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }

    async fn find_event(&self, event_id: i64) -> Result<Option<Event>> {
        Ok(self.state.lock().await.events.get(&event_id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_time, e.id));
        if let Some(limit) = filter.limit {
            events.truncate(limit.max(0) as usize);
        }
        Ok(events)
    }

    async fn find_predefined_event(&self, predefined_event_id: i64) -> Result<Option<PredefinedEvent>> {
        Ok(self.state.lock().await.predefined.get(&predefined_event_id).cloned())
    }

    async fn event_records(&self, event_id: i64) -> Result<Vec<BookingRecord>> {
        let state = self.state.lock().await;
        Ok(MemoryState::sorted_records(state.records_of(event_id).cloned()))
    }

    async fn user_records(&self, user_id: i64, include_completed: bool) -> Result<Vec<BookingRecord>> {
        let state = self.state.lock().await;
        Ok(MemoryState::sorted_records(
            state
                .records
                .values()
                .filter(|r| r.user_id == user_id && (include_completed || !r.is_completed))
                .cloned(),
        ))
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<UserEligibility>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn upsert_user(&self, facts: &UserEligibility) -> Result<()> {
        self.state.lock().await.users.insert(facts.user_id, facts.clone());
        Ok(())
    }

    async fn mark_completed(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let ended: BTreeSet<i64> = state
            .events
            .values()
            .filter(|e| e.end_time < cutoff)
            .map(|e| e.id)
            .collect();

        let mut marked = 0;
        for record in state.records.values_mut() {
            if !record.is_completed && ended.contains(&record.event_id) {
                record.is_completed = true;
                marked += 1;
            }
        }
        Ok(marked)
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_event(&mut self, event_id: i64) -> Result<Option<Event>> {
        Ok(self.staged.events.get(&event_id).cloned())
    }

    async fn lock_user(&mut self, user_id: i64) -> Result<Option<UserEligibility>> {
        Ok(self.staged.users.get(&user_id).cloned())
    }

    async fn predefined_event(&mut self, predefined_event_id: i64) -> Result<Option<PredefinedEvent>> {
        Ok(self.staged.predefined.get(&predefined_event_id).cloned())
    }

    async fn find_record(&mut self, event_id: i64, user_id: i64) -> Result<Option<BookingRecord>> {
        Ok(self.staged.find_record(event_id, user_id).cloned())
    }

    async fn count_booked(&mut self, event_id: i64) -> Result<i64> {
        Ok(self.staged.records_of(event_id).filter(|r| r.is_booked()).count() as i64)
    }

    async fn count_active_club_records(&mut self, user_id: i64) -> Result<i64> {
        let state = &self.staged;
        let count = state
            .records
            .values()
            .filter(|r| r.user_id == user_id && !r.is_completed)
            .filter(|r| state.events.get(&r.event_id).map_or(false, |e| e.is_club))
            .count();
        Ok(count as i64)
    }

    async fn has_predefined_booking(&mut self, user_id: i64, predefined_event_id: i64) -> Result<bool> {
        let state = &self.staged;
        Ok(state.records.values().any(|r| {
            r.user_id == user_id
                && r.is_booked()
                && state
                    .events
                    .get(&r.event_id)
                    .map_or(false, |e| e.predefined_event_id == Some(predefined_event_id))
        }))
    }

    async fn insert_record(&mut self, record: NewBookingRecord) -> Result<BookingRecord> {
        if !self.staged.events.contains_key(&record.event_id) {
            return Err(SlotKeeperError::EventNotFound { event_id: record.event_id });
        }
        if let Some(existing) = self.staged.find_record(record.event_id, record.user_id) {
            let conflict = if existing.is_waitlisted() {
                BookingConflict::AlreadyInWaitlist
            } else {
                BookingConflict::AlreadyBooked
            };
            return Err(conflict.into());
        }

        self.staged.next_record_id += 1;
        let inserted = BookingRecord {
            id: self.staged.next_record_id,
            user_id: record.user_id,
            event_id: record.event_id,
            is_completed: false,
            waitlist_event_id: record.waitlisted.then_some(record.event_id),
            created_at: record.created_at,
        };

        self.staged
            .event_records
            .entry(inserted.event_id)
            .or_default()
            .insert(inserted.id);
        self.staged.records.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    async fn delete_record(&mut self, record_id: i64) -> Result<()> {
        if let Some(record) = self.staged.records.remove(&record_id) {
            if let Some(ids) = self.staged.event_records.get_mut(&record.event_id) {
                ids.remove(&record_id);
            }
        }
        Ok(())
    }

    async fn waitlist(&mut self, event_id: i64) -> Result<Vec<BookingRecord>> {
        Ok(MemoryState::sorted_records(
            self.staged.records_of(event_id).filter(|r| r.is_waitlisted()).cloned(),
        ))
    }

    async fn mark_booked(&mut self, record_id: i64) -> Result<BookingRecord> {
        let record = self
            .staged
            .records
            .get_mut(&record_id)
            .ok_or_else(|| SlotKeeperError::Transient(format!("booking record {} vanished", record_id)))?;
        record.waitlist_event_id = None;
        Ok(record.clone())
    }

    async fn insert_events(&mut self, events: Vec<NewEvent>) -> Result<Vec<Event>> {
        let mut inserted = Vec::with_capacity(events.len());

        for event in events {
            self.staged.next_event_id += 1;
            let row = Event {
                id: self.staged.next_event_id,
                title: event.title,
                description: event.description,
                start_time: event.start_time,
                end_time: event.end_time,
                total_slots: event.total_slots,
                is_club: event.is_club,
                enable_booking: event.enable_booking,
                predefined_event_id: event.predefined_event_id,
                recurrence_rule: event.recurrence_rule,
                recurrence_end: event.recurrence_end,
                is_hidden: event.is_hidden,
                created_at: event.created_at,
                updated_at: event.created_at,
            };
            self.staged.events.insert(row.id, row.clone());
            inserted.push(row);
        }

        Ok(inserted)
    }

    async fn update_event(&mut self, event_id: i64, patch: &UpdateEventRequest) -> Result<Event> {
        let event = self
            .staged
            .events
            .get_mut(&event_id)
            .ok_or(SlotKeeperError::EventNotFound { event_id })?;

        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(description) = &patch.description {
            event.description = Some(description.clone());
        }
        if let Some(start_time) = patch.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            event.end_time = end_time;
        }
        if let Some(total_slots) = patch.total_slots {
            event.total_slots = total_slots;
        }
        if let Some(enable_booking) = patch.enable_booking {
            event.enable_booking = enable_booking;
        }
        event.updated_at = now_micros();

        Ok(event.clone())
    }

    async fn delete_event(&mut self, event_id: i64) -> Result<u64> {
        Ok(u64::from(self.staged.remove_event(event_id)))
    }

    async fn delete_recurrence_group(
        &mut self,
        rule: RecurrenceRule,
        created_at: DateTime<Utc>,
        from_start: DateTime<Utc>,
    ) -> Result<u64> {
        let group: Vec<i64> = self
            .staged
            .events
            .values()
            .filter(|e| {
                e.recurrence_rule == Some(rule) && e.created_at == created_at && e.start_time >= from_start
            })
            .map(|e| e.id)
            .collect();

        let mut deleted = 0;
        for event_id in group {
            if self.staged.remove_event(event_id) {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn insert_predefined_event(&mut self, request: &CreatePredefinedEventRequest) -> Result<PredefinedEvent> {
        self.staged.next_predefined_id += 1;

        let mut course_ids = request.course_ids.clone();
        course_ids.sort_unstable();
        course_ids.dedup();

        let predefined = PredefinedEvent {
            id: self.staged.next_predefined_id,
            title: request.title.clone(),
            course_ids,
            created_at: now_micros(),
        };
        self.staged.predefined.insert(predefined.id, predefined.clone());
        Ok(predefined)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
