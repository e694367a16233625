//! Waitlist promotion
//!
//! Always runs inside the unit of work that freed the slot, so a promotion
//! and the cancellation or capacity change that caused it commit together.

use tracing::debug;

use crate::database::UnitOfWork;
use crate::models::{BookingRecord, Event};
use crate::utils::errors::Result;
use crate::utils::logging::log_promotion;

#[derive(Debug, Clone, Default)]
pub struct WaitlistPromoter;

impl WaitlistPromoter {
    pub fn new() -> Self {
        Self
    }

    /// Promote the earliest waitlisted record if the event has a free slot.
    ///
    /// Users already booked on another occurrence of the same predefined
    /// event keep their place but are passed over. An empty waitlist or a
    /// full event is a no-op, not an error.
    pub async fn promote(&self, uow: &mut dyn UnitOfWork, event: &Event) -> Result<Option<BookingRecord>> {
        if !event.enable_booking {
            debug!(event_id = event.id, "Booking disabled, skipping promotion");
            return Ok(None);
        }

        let booked = uow.count_booked(event.id).await?;
        if booked >= i64::from(event.total_slots) {
            return Ok(None);
        }

        for candidate in uow.waitlist(event.id).await? {
            if let Some(predefined_event_id) = event.predefined_event_id {
                if uow.has_predefined_booking(candidate.user_id, predefined_event_id).await? {
                    debug!(
                        event_id = event.id,
                        user_id = candidate.user_id,
                        predefined_event_id,
                        "Passing over waitlisted user booked on another occurrence"
                    );
                    continue;
                }
            }

            let promoted = uow.mark_booked(candidate.id).await?;
            log_promotion(event.id, promoted.user_id, promoted.id);
            return Ok(Some(promoted));
        }

        Ok(None)
    }

    /// Promote in FIFO order until the event is full or the waitlist is empty
    pub async fn promote_all(&self, uow: &mut dyn UnitOfWork, event: &Event) -> Result<Vec<BookingRecord>> {
        let mut promoted = Vec::new();
        while let Some(record) = self.promote(uow, event).await? {
            promoted.push(record);
        }
        Ok(promoted)
    }
}
