//! SlotKeeper
//!
//! Event capacity and waitlist engine: expands recurring events into
//! occurrences, and books, cancels and waitlists users against each event's
//! finite capacity inside serializable transactions, promoting the waitlist
//! in FIFO order as slots free up.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{BookingConflict, Result, SlotKeeperError, ValidationError};

// Re-export main components for easy access
pub use database::{DatabaseService, EventStore, MemoryEventStore, UnitOfWork};
pub use services::{BookingEngine, CompletionSweeper, NotificationEmitter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
