//! Database module
//!
//! This module handles database connections, the store abstraction the
//! engine runs against, and its PostgreSQL and in-memory implementations.

pub mod connection;
pub mod memory;
pub mod repositories;
pub mod service;
pub mod store;
pub mod transaction;

// Re-export commonly used database components
pub use connection::{DatabasePool, create_pool, health_check, pool_options, run_migrations};
pub use memory::MemoryEventStore;
pub use repositories::{EventRepository, BookingRepository, UserRepository};
pub use service::DatabaseService;
pub use store::{EventStore, UnitOfWork};
pub use transaction::PgUnitOfWork;
