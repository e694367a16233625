//! Fixture data shared by the integration tests

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use SlotKeeper::models::{Actor, UserEligibility, UserRole};

pub const ADMIN_ID: i64 = 1;
pub const TEACHER_ID: i64 = 2;

/// Club members get ids from 100, course students from 200
pub const CLUB_MEMBER_BASE: i64 = 100;
pub const COURSE_STUDENT_BASE: i64 = 200;
pub const OUTSIDER_ID: i64 = 300;

pub const COURSE_ID: i64 = 10;
pub const OTHER_COURSE_ID: i64 = 11;

pub fn club_member(n: i64) -> UserEligibility {
    UserEligibility::student(CLUB_MEMBER_BASE + n).in_club()
}

pub fn course_student(n: i64, course_id: i64) -> UserEligibility {
    UserEligibility::student(COURSE_STUDENT_BASE + n).in_course(course_id)
}

pub fn admin() -> UserEligibility {
    UserEligibility::student(ADMIN_ID).with_role(UserRole::Admin)
}

pub fn teacher() -> UserEligibility {
    UserEligibility::student(TEACHER_ID).with_role(UserRole::Teacher)
}

pub fn actor_for(user: &UserEligibility) -> Actor {
    Actor::new(user.user_id, user.role)
}

/// Whole hour `days` days from now, so generated times are stable
pub fn days_ahead(days: i64) -> DateTime<Utc> {
    let target = Utc::now() + Duration::days(days);
    Utc.with_ymd_and_hms(target.year(), target.month(), target.day(), 10, 0, 0)
        .single()
        .expect("valid fixture time")
}

/// First Monday at 10:00 that is at least a week away
pub fn next_monday() -> DateTime<Utc> {
    let mut day = days_ahead(7);
    while day.weekday() != chrono::Weekday::Mon {
        day += Duration::days(1);
    }
    day
}

pub fn date_ahead(days: i64) -> NaiveDate {
    days_ahead(days).date_naive()
}
