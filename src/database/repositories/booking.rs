//! Booking record repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::booking::BookingRecord;
use crate::utils::errors::SlotKeeperError;

pub(crate) const RECORD_COLUMNS: &str = "id, user_id, event_id, is_completed, waitlist_event_id, created_at";

#[derive(Clone, Debug)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Booked and waitlisted records of an event, oldest first
    pub async fn for_event(&self, event_id: i64) -> Result<Vec<BookingRecord>, SlotKeeperError> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM booking_records WHERE event_id = $1 ORDER BY created_at ASC, id ASC",
            RECORD_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Records held by a user
    pub async fn for_user(&self, user_id: i64, include_completed: bool) -> Result<Vec<BookingRecord>, SlotKeeperError> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM booking_records WHERE user_id = $1 AND ($2 OR is_completed = false) ORDER BY created_at ASC, id ASC",
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .bind(include_completed)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Mark records of events that ended before the cutoff as completed
    pub async fn mark_completed(&self, cutoff: DateTime<Utc>) -> Result<u64, SlotKeeperError> {
        let result = sqlx::query(
            r#"
            UPDATE booking_records b
            SET is_completed = true
            FROM events e
            WHERE b.event_id = e.id
              AND b.is_completed = false
              AND e.end_time < $1
            "#
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
