//! Capacity ledger
//!
//! The booking state machine for one (user, event) pair:
//!
//! ```text
//! ABSENT -> BOOKED       set_booking(join)
//! ABSENT -> WAITLISTED   set_waitlist(join)
//! BOOKED -> ABSENT       set_booking(leave), then one promotion
//! WAITLISTED -> ABSENT   set_waitlist(leave)
//! WAITLISTED -> BOOKED   promotion only
//! ```
//!
//! Every check re-reads state through the unit of work after the event and
//! user rows are locked, never from values read before the transaction.

use chrono::{DateTime, Utc};

use crate::config::BookingConfig;
use crate::database::UnitOfWork;
use crate::models::{
    BookingOutcome, BookingRequest, BookingState, Event, NewBookingRecord, NotificationFact, PredefinedEvent,
};
use crate::services::eligibility::{BookingAction, EligibilityChecker};
use crate::services::promoter::WaitlistPromoter;
use crate::utils::errors::{BookingConflict, Result, SlotKeeperError};
use crate::utils::helpers::free_slots;
use crate::utils::logging::log_booking_action;

/// Low-slots fact when fewer than `threshold` slots remain free
pub fn low_slots_fact(event: &Event, booked: i64, threshold: i64) -> Option<NotificationFact> {
    let free = free_slots(event.total_slots, booked);
    (free < threshold).then_some(NotificationFact::SlotsLow {
        event_id: event.id,
        free_slots: free,
        total_slots: event.total_slots,
    })
}

#[derive(Debug, Clone)]
pub struct CapacityLedger {
    club_booking_limit: i64,
    low_slots_threshold: i64,
    checker: EligibilityChecker,
    promoter: WaitlistPromoter,
}

impl CapacityLedger {
    pub fn new(config: &BookingConfig) -> Self {
        Self {
            club_booking_limit: config.club_booking_limit,
            low_slots_threshold: config.low_slots_threshold,
            checker: EligibilityChecker::new(),
            promoter: WaitlistPromoter::new(),
        }
    }

    /// Book (`join`) or cancel a booked slot
    pub async fn set_booking(&self, uow: &mut dyn UnitOfWork, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        if request.join {
            self.book(uow, request, now).await
        } else {
            self.cancel(uow, request, now).await
        }
    }

    /// Join or leave the waitlist
    pub async fn set_waitlist(&self, uow: &mut dyn UnitOfWork, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        if request.join {
            self.join_waitlist(uow, request, now).await
        } else {
            self.leave_waitlist(uow, request, now).await
        }
    }

    async fn book(&self, uow: &mut dyn UnitOfWork, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        let (event, _) = self.prepare(uow, request, BookingAction::Book, now).await?;

        if !event.enable_booking {
            return Err(BookingConflict::BookingDisabled.into());
        }

        let booked = uow.count_booked(event.id).await?;
        if booked >= i64::from(event.total_slots) {
            return Err(BookingConflict::NoMoreSlots.into());
        }

        // Waitlisted users move up through promotion, never past the queue
        match uow.find_record(event.id, request.user_id).await? {
            Some(record) if record.is_booked() => return Err(BookingConflict::AlreadyBooked.into()),
            Some(_) => return Err(BookingConflict::AlreadyInWaitlist.into()),
            None => {}
        }

        if event.is_club {
            self.check_club_limit(uow, request.user_id).await?;
        }
        self.check_predefined_booking(uow, &event, request.user_id).await?;

        let record = uow
            .insert_record(NewBookingRecord {
                user_id: request.user_id,
                event_id: event.id,
                waitlisted: false,
                created_at: now,
            })
            .await?;
        log_booking_action(event.id, request.user_id, request.actor.user_id, BookingState::Absent, BookingState::Booked);

        let facts = low_slots_fact(&event, booked + 1, self.low_slots_threshold).into_iter().collect();
        Ok(BookingOutcome { record: Some(record), promoted_user_id: None, facts })
    }

    async fn cancel(&self, uow: &mut dyn UnitOfWork, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        let (event, _) = self.prepare(uow, request, BookingAction::CancelBooking, now).await?;

        let record = match uow.find_record(event.id, request.user_id).await? {
            Some(record) if record.is_booked() => record,
            _ => return Err(BookingConflict::NotBooked.into()),
        };

        uow.delete_record(record.id).await?;
        log_booking_action(event.id, request.user_id, request.actor.user_id, BookingState::Booked, BookingState::Absent);

        let promoted = self.promoter.promote(uow, &event).await?;
        let facts = promoted
            .as_ref()
            .map(|p| NotificationFact::WaitlistPromoted { event_id: event.id, user_id: p.user_id })
            .into_iter()
            .collect();

        Ok(BookingOutcome {
            record: None,
            promoted_user_id: promoted.map(|p| p.user_id),
            facts,
        })
    }

    async fn join_waitlist(&self, uow: &mut dyn UnitOfWork, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        let (event, _) = self.prepare(uow, request, BookingAction::JoinWaitlist, now).await?;

        match uow.find_record(event.id, request.user_id).await? {
            Some(record) if record.is_booked() => return Err(BookingConflict::AlreadyBookedInWaitlist.into()),
            Some(_) => return Err(BookingConflict::AlreadyInWaitlist.into()),
            None => {}
        }

        if !event.enable_booking {
            return Err(BookingConflict::BookingDisabled.into());
        }

        if event.is_club {
            self.check_club_limit(uow, request.user_id).await?;
        }
        // Promotion would skip this record anyway
        self.check_predefined_booking(uow, &event, request.user_id).await?;

        let record = uow
            .insert_record(NewBookingRecord {
                user_id: request.user_id,
                event_id: event.id,
                waitlisted: true,
                created_at: now,
            })
            .await?;
        log_booking_action(event.id, request.user_id, request.actor.user_id, BookingState::Absent, BookingState::Waitlisted);

        Ok(BookingOutcome { record: Some(record), promoted_user_id: None, facts: Vec::new() })
    }

    async fn leave_waitlist(&self, uow: &mut dyn UnitOfWork, request: &BookingRequest, now: DateTime<Utc>) -> Result<BookingOutcome> {
        let (event, _) = self.prepare(uow, request, BookingAction::LeaveWaitlist, now).await?;

        let record = match uow.find_record(event.id, request.user_id).await? {
            Some(record) if record.is_waitlisted() => record,
            _ => return Err(BookingConflict::NotInWaitlist.into()),
        };

        // No slot was held, so nothing to promote
        uow.delete_record(record.id).await?;
        log_booking_action(event.id, request.user_id, request.actor.user_id, BookingState::Waitlisted, BookingState::Absent);

        Ok(BookingOutcome::default())
    }

    /// Lock the event and user rows, then run the eligibility guard
    async fn prepare(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &BookingRequest,
        action: BookingAction,
        now: DateTime<Utc>,
    ) -> Result<(Event, Option<PredefinedEvent>)> {
        let event = uow
            .lock_event(request.event_id)
            .await?
            .ok_or(SlotKeeperError::EventNotFound { event_id: request.event_id })?;

        let user = uow
            .lock_user(request.user_id)
            .await?
            .ok_or(SlotKeeperError::UserNotFound { user_id: request.user_id })?;

        let predefined = match event.predefined_event_id {
            Some(id) => uow.predefined_event(id).await?,
            None => None,
        };

        self.checker
            .check(&request.actor, &user, &event, predefined.as_ref(), action, now)?;

        Ok((event, predefined))
    }

    async fn check_predefined_booking(&self, uow: &mut dyn UnitOfWork, event: &Event, user_id: i64) -> Result<()> {
        if let Some(predefined_event_id) = event.predefined_event_id {
            if uow.has_predefined_booking(user_id, predefined_event_id).await? {
                return Err(BookingConflict::AlreadyBookedPredefinedEvent.into());
            }
        }
        Ok(())
    }

    async fn check_club_limit(&self, uow: &mut dyn UnitOfWork, user_id: i64) -> Result<()> {
        let active = uow.count_active_club_records(user_id).await?;
        if active >= self.club_booking_limit {
            return Err(BookingConflict::ClubLimitReached.into());
        }
        Ok(())
    }
}
