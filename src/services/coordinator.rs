//! Event mutation coordinator
//!
//! Creation, capacity and window changes, and deletion of events. Request
//! shape is validated by the `validate_*` functions before a unit of work
//! is opened; everything that depends on stored state is checked again
//! inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BookingConfig;
use crate::database::UnitOfWork;
use crate::models::{
    BookingRecord, CreateEventRequest, CreatePredefinedEventRequest, Event, NewEvent, NotificationFact,
    PredefinedEvent, RecurrenceRule, UpdateEventRequest,
};
use crate::services::ledger::low_slots_fact;
use crate::services::promoter::WaitlistPromoter;
use crate::services::recurrence::{Occurrence, RecurrenceExpander, RecurrenceRequest};
use crate::utils::errors::{BookingConflict, Result, SlotKeeperError, ValidationError};
use crate::utils::logging::log_capacity_change;

/// Result of an event update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventChange {
    pub event: Event,
    /// Records promoted from the waitlist, in FIFO order
    pub promoted: Vec<BookingRecord>,
    pub facts: Vec<NotificationFact>,
}

#[derive(Debug, Clone)]
pub struct EventMutationCoordinator {
    expander: RecurrenceExpander,
    promoter: WaitlistPromoter,
    low_slots_threshold: i64,
}

impl EventMutationCoordinator {
    pub fn new(config: &BookingConfig) -> Self {
        Self {
            expander: RecurrenceExpander::from_config(config),
            promoter: WaitlistPromoter::new(),
            low_slots_threshold: config.low_slots_threshold,
        }
    }

    /// Check a creation request and expand it into occurrences
    pub fn validate_create(&self, request: &CreateEventRequest, now: DateTime<Utc>) -> Result<Vec<Occurrence>> {
        if request.is_club {
            if request.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
                return Err(ValidationError::MissingTitle.into());
            }
            if request.predefined_event_id.is_some() {
                return Err(ValidationError::ClubEventWithPredefinedEvent.into());
            }
        } else {
            if request.predefined_event_id.is_none() {
                return Err(ValidationError::MissingPredefinedEvent.into());
            }
            if request.title.is_some() {
                return Err(ValidationError::TitleDerivedFromPredefinedEvent.into());
            }
        }

        if request.total_slots < 0 {
            return Err(ValidationError::NegativeSlots.into());
        }

        let occurrences = self.expander.expand(&RecurrenceRequest::from(request), now)?;
        Ok(occurrences)
    }

    /// Shape checks for a patch that need no stored state
    pub fn validate_update(&self, patch: &UpdateEventRequest) -> Result<()> {
        if patch.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }

        if patch.total_slots.map_or(false, |slots| slots < 0) {
            return Err(ValidationError::NegativeSlots.into());
        }

        if let (Some(start), Some(end)) = (patch.start_time, patch.end_time) {
            if end <= start {
                return Err(ValidationError::EndBeforeStart.into());
            }
        }

        Ok(())
    }

    /// Persist every occurrence of a validated request as one group.
    ///
    /// All rows share `created_at`, which together with the rule identifies
    /// the recurrence group for later bulk deletion.
    pub async fn create_events(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &CreateEventRequest,
        occurrences: &[Occurrence],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let title = match (request.is_club, request.predefined_event_id) {
            (false, Some(predefined_event_id)) => {
                uow.predefined_event(predefined_event_id)
                    .await?
                    .ok_or(SlotKeeperError::PredefinedEventNotFound { predefined_event_id })?
                    .title
            }
            _ => request.title.clone().ok_or(ValidationError::MissingTitle)?,
        };

        let rows = occurrences
            .iter()
            .map(|occurrence| NewEvent {
                title: title.clone(),
                description: request.description.clone(),
                start_time: occurrence.start_time,
                end_time: occurrence.end_time,
                total_slots: request.total_slots,
                is_club: request.is_club,
                enable_booking: request.enable_booking,
                predefined_event_id: request.predefined_event_id,
                recurrence_rule: request.recurrence_rule,
                recurrence_end: request.recurrence_end,
                is_hidden: request.is_hidden,
                created_at,
            })
            .collect();

        let events = uow.insert_events(rows).await?;
        info!(
            count = events.len(),
            rule = ?request.recurrence_rule,
            is_club = request.is_club,
            "Events created"
        );
        Ok(events)
    }

    /// Apply a capacity/window patch.
    ///
    /// Shrinking below the current booked count is rejected. Whenever the
    /// patched event takes bookings and has free slots, waitlisted users are
    /// promoted in FIFO order until it is full or the waitlist is empty. This
    /// covers growing the capacity and re-enabling booking after slots were
    /// freed while it was disabled.
    pub async fn update_event(
        &self,
        uow: &mut dyn UnitOfWork,
        event_id: i64,
        patch: &UpdateEventRequest,
    ) -> Result<EventChange> {
        let current = uow
            .lock_event(event_id)
            .await?
            .ok_or(SlotKeeperError::EventNotFound { event_id })?;

        if patch.title.is_some() && !current.is_club {
            return Err(ValidationError::TitleDerivedFromPredefinedEvent.into());
        }

        let start = patch.start_time.unwrap_or(current.start_time);
        let end = patch.end_time.unwrap_or(current.end_time);
        if end <= start {
            return Err(ValidationError::EndBeforeStart.into());
        }

        let booked = uow.count_booked(event_id).await?;
        if let Some(total_slots) = patch.total_slots {
            if i64::from(total_slots) < booked {
                return Err(BookingConflict::TotalSlotsLessThanBooked.into());
            }
        }

        let event = uow.update_event(event_id, patch).await?;

        let promoted = self.promoter.promote_all(uow, &event).await?;

        let mut facts: Vec<NotificationFact> = promoted
            .iter()
            .map(|record| NotificationFact::WaitlistPromoted { event_id, user_id: record.user_id })
            .collect();

        if patch.total_slots.is_some() {
            log_capacity_change(event_id, current.total_slots, event.total_slots, promoted.len());
            facts.extend(low_slots_fact(&event, booked + promoted.len() as i64, self.low_slots_threshold));
        } else {
            debug!(event_id, "Event window updated");
        }

        Ok(EventChange { event, promoted, facts })
    }

    /// Delete one event, or with `rule` every event of its recurrence group
    /// starting at or after it. Booking records go with their events.
    pub async fn delete_event(
        &self,
        uow: &mut dyn UnitOfWork,
        event_id: i64,
        rule: Option<RecurrenceRule>,
    ) -> Result<u64> {
        let event = uow
            .lock_event(event_id)
            .await?
            .ok_or(SlotKeeperError::EventNotFound { event_id })?;

        let deleted = match rule {
            None => uow.delete_event(event_id).await?,
            Some(rule) => self.remove_events_by_recurrence(uow, &event, rule).await?,
        };

        info!(event_id, deleted, rule = ?rule, "Events deleted");
        Ok(deleted)
    }

    pub async fn remove_events_by_recurrence(
        &self,
        uow: &mut dyn UnitOfWork,
        reference: &Event,
        rule: RecurrenceRule,
    ) -> Result<u64> {
        if reference.recurrence_rule != Some(rule) {
            return Err(ValidationError::RecurrenceRuleMismatch(rule.to_string()).into());
        }

        uow.delete_recurrence_group(rule, reference.created_at, reference.start_time)
            .await
    }

    pub async fn create_predefined_event(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &CreatePredefinedEventRequest,
    ) -> Result<PredefinedEvent> {
        if request.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }

        let predefined = uow.insert_predefined_event(request).await?;
        info!(predefined_event_id = predefined.id, courses = predefined.course_ids.len(), "Predefined event created");
        Ok(predefined)
    }
}
