//! Database repositories module
//!
//! This module contains the PostgreSQL read-side repositories

pub mod event;
pub mod booking;
pub mod user;

// Re-export repositories
pub use event::EventRepository;
pub use booking::BookingRepository;
pub use user::UserRepository;
