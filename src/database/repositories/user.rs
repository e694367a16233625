//! User eligibility repository implementation

use sqlx::PgPool;
use crate::models::user::UserEligibility;
use crate::utils::errors::SlotKeeperError;

pub(crate) const USER_COLUMNS: &str = "id AS user_id, role, is_in_club, course_id, is_calendar_enable, calendar_blocking_deadline";

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find user eligibility facts by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserEligibility>, SlotKeeperError> {
        let user = sqlx::query_as::<_, UserEligibility>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Insert or refresh eligibility facts
    pub async fn upsert(&self, facts: &UserEligibility) -> Result<(), SlotKeeperError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, role, is_in_club, course_id, is_calendar_enable, calendar_blocking_deadline, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO UPDATE
            SET role = EXCLUDED.role,
                is_in_club = EXCLUDED.is_in_club,
                course_id = EXCLUDED.course_id,
                is_calendar_enable = EXCLUDED.is_calendar_enable,
                calendar_blocking_deadline = EXCLUDED.calendar_blocking_deadline,
                updated_at = NOW()
            "#
        )
        .bind(facts.user_id)
        .bind(facts.role)
        .bind(facts.is_in_club)
        .bind(facts.course_id)
        .bind(facts.is_calendar_enable)
        .bind(facts.calendar_blocking_deadline)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
