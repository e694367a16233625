//! Test helpers module
//!
//! Shared setup for the integration tests: an engine over the in-memory
//! store, fixture builders, and a PostgreSQL database for the ignored
//! database-backed tests.

#![allow(dead_code)]

pub mod database_helper;
pub mod test_context;
pub mod test_data;

pub use database_helper::*;
pub use test_context::*;
pub use test_data::*;
