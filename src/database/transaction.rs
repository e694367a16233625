//! PostgreSQL unit of work
//!
//! Every unit of work is a `SERIALIZABLE` transaction with a bounded
//! statement timeout. Rows the engine decides on are additionally locked
//! with `FOR UPDATE` so concurrent writers queue instead of racing to a
//! serialization failure on the hot path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::database::repositories::booking::RECORD_COLUMNS;
use crate::database::repositories::event::{EVENT_COLUMNS, PREDEFINED_EVENT_SELECT};
use crate::database::repositories::user::USER_COLUMNS;
use crate::database::store::UnitOfWork;
use crate::models::{
    BookingRecord, CreatePredefinedEventRequest, Event, NewBookingRecord, NewEvent, PredefinedEvent,
    RecurrenceRule, UpdateEventRequest, UserEligibility,
};
use crate::utils::errors::{Result, SlotKeeperError};
use crate::utils::helpers::now_micros;

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    pub async fn begin(pool: &PgPool, statement_timeout_ms: u64) -> Result<Self> {
        let mut tx = pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // SET does not accept bind parameters
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", statement_timeout_ms))
            .execute(&mut *tx)
            .await?;

        Ok(Self { tx })
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_event(&mut self, event_id: i64) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE id = $1 FOR UPDATE",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(event)
    }

    async fn lock_user(&mut self, user_id: i64) -> Result<Option<UserEligibility>> {
        let user = sqlx::query_as::<_, UserEligibility>(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn predefined_event(&mut self, predefined_event_id: i64) -> Result<Option<PredefinedEvent>> {
        let predefined = sqlx::query_as::<_, PredefinedEvent>(PREDEFINED_EVENT_SELECT)
            .bind(predefined_event_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(predefined)
    }

    async fn find_record(&mut self, event_id: i64, user_id: i64) -> Result<Option<BookingRecord>> {
        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM booking_records WHERE event_id = $1 AND user_id = $2",
            RECORD_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn count_booked(&mut self, event_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM booking_records WHERE event_id = $1 AND waitlist_event_id IS NULL"
        )
        .bind(event_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count.0)
    }

    async fn count_active_club_records(&mut self, user_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM booking_records b
            INNER JOIN events e ON e.id = b.event_id
            WHERE b.user_id = $1 AND b.is_completed = false AND e.is_club = true
            "#
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count.0)
    }

    async fn has_predefined_booking(&mut self, user_id: i64, predefined_event_id: i64) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM booking_records b
                INNER JOIN events e ON e.id = b.event_id
                WHERE b.user_id = $1
                  AND b.waitlist_event_id IS NULL
                  AND e.predefined_event_id = $2
            )
            "#
        )
        .bind(user_id)
        .bind(predefined_event_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists.0)
    }

    async fn insert_record(&mut self, record: NewBookingRecord) -> Result<BookingRecord> {
        let waitlist_event_id = record.waitlisted.then_some(record.event_id);
        let inserted = sqlx::query_as::<_, BookingRecord>(&format!(
            r#"
            INSERT INTO booking_records (user_id, event_id, is_completed, waitlist_event_id, created_at)
            VALUES ($1, $2, false, $3, $4)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(record.user_id)
        .bind(record.event_id)
        .bind(waitlist_event_id)
        .bind(record.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(inserted)
    }

    async fn delete_record(&mut self, record_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM booking_records WHERE id = $1")
            .bind(record_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn waitlist(&mut self, event_id: i64) -> Result<Vec<BookingRecord>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            r#"
            SELECT {}
            FROM booking_records
            WHERE waitlist_event_id = $1
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#,
            RECORD_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn mark_booked(&mut self, record_id: i64) -> Result<BookingRecord> {
        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "UPDATE booking_records SET waitlist_event_id = NULL WHERE id = $1 RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(record_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn insert_events(&mut self, events: Vec<NewEvent>) -> Result<Vec<Event>> {
        let mut inserted = Vec::with_capacity(events.len());

        for event in events {
            let row = sqlx::query_as::<_, Event>(&format!(
                r#"
                INSERT INTO events (title, description, start_time, end_time, total_slots, is_club, enable_booking,
                                    predefined_event_id, recurrence_rule, recurrence_end, is_hidden, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
                RETURNING {}
                "#,
                EVENT_COLUMNS
            ))
            .bind(event.title)
            .bind(event.description)
            .bind(event.start_time)
            .bind(event.end_time)
            .bind(event.total_slots)
            .bind(event.is_club)
            .bind(event.enable_booking)
            .bind(event.predefined_event_id)
            .bind(event.recurrence_rule)
            .bind(event.recurrence_end)
            .bind(event.is_hidden)
            .bind(event.created_at)
            .fetch_one(&mut *self.tx)
            .await?;

            inserted.push(row);
        }

        Ok(inserted)
    }

    async fn update_event(&mut self, event_id: i64, patch: &UpdateEventRequest) -> Result<Event> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                start_time = COALESCE($4, start_time),
                end_time = COALESCE($5, end_time),
                total_slots = COALESCE($6, total_slots),
                enable_booking = COALESCE($7, enable_booking),
                updated_at = $8
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.start_time)
        .bind(patch.end_time)
        .bind(patch.total_slots)
        .bind(patch.enable_booking)
        .bind(now_micros())
        .fetch_optional(&mut *self.tx)
        .await?;

        event.ok_or(SlotKeeperError::EventNotFound { event_id })
    }

    async fn delete_event(&mut self, event_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_recurrence_group(
        &mut self,
        rule: RecurrenceRule,
        created_at: DateTime<Utc>,
        from_start: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM events WHERE recurrence_rule = $1 AND created_at = $2 AND start_time >= $3"
        )
        .bind(rule)
        .bind(created_at)
        .bind(from_start)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_predefined_event(&mut self, request: &CreatePredefinedEventRequest) -> Result<PredefinedEvent> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO predefined_events (title, created_at) VALUES ($1, $2) RETURNING id"
        )
        .bind(&request.title)
        .bind(now_micros())
        .fetch_one(&mut *self.tx)
        .await?;

        for course_id in &request.course_ids {
            sqlx::query(
                "INSERT INTO predefined_event_courses (predefined_event_id, course_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
            )
            .bind(id)
            .bind(course_id)
            .execute(&mut *self.tx)
            .await?;
        }

        self.predefined_event(id)
            .await?
            .ok_or(SlotKeeperError::PredefinedEventNotFound { predefined_event_id: id })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
