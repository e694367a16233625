//! User eligibility model
//!
//! Only the fields the booking engine needs are kept here; identity and
//! profile data belong to the user management collaborator.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
    Guest,
}

impl UserRole {
    /// Admins and teachers may act on behalf of other users.
    pub fn is_privileged(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Teacher)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserEligibility {
    pub user_id: i64,
    pub role: UserRole,
    pub is_in_club: bool,
    pub course_id: Option<i64>,
    pub is_calendar_enable: bool,
    pub calendar_blocking_deadline: Option<DateTime<Utc>>,
}

impl UserEligibility {
    pub fn student(user_id: i64) -> Self {
        Self {
            user_id,
            role: UserRole::Student,
            is_in_club: false,
            course_id: None,
            is_calendar_enable: true,
            calendar_blocking_deadline: None,
        }
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    pub fn in_club(mut self) -> Self {
        self.is_in_club = true;
        self
    }

    pub fn in_course(mut self, course_id: i64) -> Self {
        self.course_id = Some(course_id);
        self
    }

    pub fn calendar_blocked_until(mut self, deadline: DateTime<Utc>) -> Self {
        self.is_calendar_enable = false;
        self.calendar_blocking_deadline = Some(deadline);
        self
    }

    /// True while the user's calendar is disabled and the block has not lapsed.
    pub fn is_calendar_blocked(&self, now: DateTime<Utc>) -> bool {
        !self.is_calendar_enable
            && self
                .calendar_blocking_deadline
                .map_or(false, |deadline| now < deadline)
    }
}

/// Whoever issues a request; may differ from the user being booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn student(user_id: i64) -> Self {
        Self::new(user_id, UserRole::Student)
    }

    pub fn admin(user_id: i64) -> Self {
        Self::new(user_id, UserRole::Admin)
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}
