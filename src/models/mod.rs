//! Data models module
//!
//! This module contains all data structures used throughout the engine

pub mod event;
pub mod booking;
pub mod user;
pub mod notification;

// Re-export commonly used models
pub use event::{Event, PredefinedEvent, RecurrenceRule, NewEvent, CreateEventRequest, UpdateEventRequest, CreatePredefinedEventRequest, EventFilter, EventAvailability};
pub use booking::{BookingRecord, NewBookingRecord, BookingState, BookingRequest, BookingOutcome, EventParticipants, WaitlistEntry};
pub use user::{UserEligibility, UserRole, Actor};
pub use notification::NotificationFact;
