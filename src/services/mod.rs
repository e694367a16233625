//! Services module
//!
//! This module contains the booking engine and the components it is built
//! from: recurrence expansion, eligibility, the capacity ledger, waitlist
//! promotion, event mutation and the notification boundary.

pub mod coordinator;
pub mod eligibility;
pub mod engine;
pub mod ledger;
pub mod notification;
pub mod promoter;
pub mod recurrence;
pub mod sweeper;

// Re-export commonly used services
pub use coordinator::{EventChange, EventMutationCoordinator};
pub use eligibility::{BookingAction, EligibilityChecker};
pub use engine::BookingEngine;
pub use ledger::CapacityLedger;
pub use notification::{log_notifications, NotificationEmitter, NotificationReceiver, NotificationStats};
pub use promoter::WaitlistPromoter;
pub use recurrence::{Occurrence, RecurrenceExpander, RecurrenceRequest};
pub use sweeper::CompletionSweeper;
