//! Notification facts emitted by the booking engine

use serde::{Deserialize, Serialize};

/// Outcome facts handed to the external notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationFact {
    SlotsLow {
        event_id: i64,
        free_slots: i64,
        total_slots: i32,
    },
    WaitlistPromoted {
        event_id: i64,
        user_id: i64,
    },
}

impl NotificationFact {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationFact::SlotsLow { .. } => "SLOTS_LOW",
            NotificationFact::WaitlistPromoted { .. } => "WAITLIST_PROMOTED",
        }
    }

    pub fn event_id(&self) -> i64 {
        match self {
            NotificationFact::SlotsLow { event_id, .. } => *event_id,
            NotificationFact::WaitlistPromoted { event_id, .. } => *event_id,
        }
    }
}
