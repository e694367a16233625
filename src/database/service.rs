//! Database service layer
//!
//! PostgreSQL-backed [`EventStore`]: read-side queries go through the
//! repositories, mutations through [`PgUnitOfWork`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::{DatabasePool, EventRepository, BookingRepository, UserRepository};
use crate::database::store::{EventStore, UnitOfWork};
use crate::database::transaction::PgUnitOfWork;
use crate::models::*;
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub events: EventRepository,
    pub bookings: BookingRepository,
    pub users: UserRepository,
    pool: DatabasePool,
    statement_timeout_ms: u64,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool, statement_timeout_ms: u64) -> Self {
        Self {
            events: EventRepository::new(pool.clone()),
            bookings: BookingRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
            statement_timeout_ms,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for DatabaseService {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let uow = PgUnitOfWork::begin(&self.pool, self.statement_timeout_ms).await?;
        Ok(Box::new(uow))
    }

    async fn find_event(&self, event_id: i64) -> Result<Option<Event>> {
        self.events.find_by_id(event_id).await
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.events.list(filter).await
    }

    async fn find_predefined_event(&self, predefined_event_id: i64) -> Result<Option<PredefinedEvent>> {
        self.events.find_predefined(predefined_event_id).await
    }

    async fn event_records(&self, event_id: i64) -> Result<Vec<BookingRecord>> {
        self.bookings.for_event(event_id).await
    }

    async fn user_records(&self, user_id: i64, include_completed: bool) -> Result<Vec<BookingRecord>> {
        self.bookings.for_user(user_id, include_completed).await
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<UserEligibility>> {
        self.users.find_by_id(user_id).await
    }

    async fn upsert_user(&self, facts: &UserEligibility) -> Result<()> {
        self.users.upsert(facts).await
    }

    async fn mark_completed(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.bookings.mark_completed(cutoff).await
    }
}
