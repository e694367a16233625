//! Event repository implementation

use sqlx::PgPool;
use crate::models::event::{Event, EventFilter, PredefinedEvent};
use crate::utils::errors::SlotKeeperError;

pub(crate) const EVENT_COLUMNS: &str = "id, title, description, start_time, end_time, total_slots, is_club, enable_booking, predefined_event_id, recurrence_rule, recurrence_end, is_hidden, created_at, updated_at";

pub(crate) const PREDEFINED_EVENT_SELECT: &str = r#"
    SELECT p.id, p.title, p.created_at,
           COALESCE(array_agg(c.course_id ORDER BY c.course_id) FILTER (WHERE c.course_id IS NOT NULL), '{}') AS course_ids
    FROM predefined_events p
    LEFT JOIN predefined_event_courses c ON c.predefined_event_id = p.id
    WHERE p.id = $1
    GROUP BY p.id
"#;

#[derive(Clone, Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, SlotKeeperError> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// List visible events matching the filter
    pub async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, SlotKeeperError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            r#"
            SELECT {}
            FROM events
            WHERE is_hidden = false
              AND ($1::timestamptz IS NULL OR end_time >= $1)
              AND ($2::timestamptz IS NULL OR start_time <= $2)
              AND ($3::boolean IS NULL OR is_club = $3)
              AND ($4::bigint IS NULL OR predefined_event_id = $4)
            ORDER BY start_time ASC, id ASC
            LIMIT $5
            "#,
            EVENT_COLUMNS
        ))
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.is_club)
        .bind(filter.predefined_event_id)
        .bind(filter.limit.unwrap_or(500))
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Find predefined event with its course ids
    pub async fn find_predefined(&self, id: i64) -> Result<Option<PredefinedEvent>, SlotKeeperError> {
        let predefined = sqlx::query_as::<_, PredefinedEvent>(PREDEFINED_EVENT_SELECT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(predefined)
    }

    /// Count visible events
    pub async fn count(&self) -> Result<i64, SlotKeeperError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events WHERE is_hidden = false")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
