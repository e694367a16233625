//! Booking eligibility rules
//!
//! Side-effect free guard evaluated inside the booking transaction, against
//! the facts the transaction has just read and locked.

use chrono::{DateTime, Utc};

use crate::models::{Actor, Event, PredefinedEvent, UserEligibility};
use crate::utils::errors::{BookingConflict, Result, SlotKeeperError};

/// What the request is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Book,
    CancelBooking,
    JoinWaitlist,
    LeaveWaitlist,
}

impl BookingAction {
    pub fn is_join(&self) -> bool {
        matches!(self, BookingAction::Book | BookingAction::JoinWaitlist)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EligibilityChecker;

impl EligibilityChecker {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `actor` may perform `action` for `user` on `event`.
    ///
    /// `predefined` must be the event's predefined template for non-club
    /// events; club events ignore it.
    pub fn check(
        &self,
        actor: &Actor,
        user: &UserEligibility,
        event: &Event,
        predefined: Option<&PredefinedEvent>,
        action: BookingAction,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !actor.is_privileged() && actor.user_id != user.user_id {
            return Err(SlotKeeperError::PermissionDenied(format!(
                "user {} cannot change bookings of user {}",
                actor.user_id, user.user_id
            )));
        }

        // Leaving never needs eligibility
        if !action.is_join() {
            return Ok(());
        }

        if event.has_started(now) {
            return Err(BookingConflict::AlreadyStarted.into());
        }

        if actor.is_privileged() {
            return Ok(());
        }

        if !self.can_book_or_waitlist(user, event, predefined) {
            return Err(BookingConflict::NotEligible.into());
        }

        if user.is_calendar_blocked(now) {
            return Err(BookingConflict::CalendarBlocked.into());
        }

        Ok(())
    }

    /// Club events need club membership, course events need the user's
    /// course to be one the predefined template applies to.
    pub fn can_book_or_waitlist(&self, user: &UserEligibility, event: &Event, predefined: Option<&PredefinedEvent>) -> bool {
        if event.is_club {
            return user.is_in_club;
        }

        match (user.course_id, predefined) {
            (Some(course_id), Some(predefined)) => predefined.course_ids.contains(&course_id),
            _ => false,
        }
    }
}
