//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub booking: BookingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    pub json: bool,
}

/// Booking engine tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookingConfig {
    /// Maximum simultaneous non-completed club bookings/waitlist entries per user
    pub club_booking_limit: i64,
    /// Free-slot count below which a low-slots fact is emitted
    pub low_slots_threshold: i64,
    pub transaction_timeout_ms: u64,
    /// Automatic retries on serialization failure; 0 surfaces them to the caller
    pub serialization_retries: u32,
    pub completion_sweep_interval_secs: u64,
    /// Recurrence horizon when no end date is given
    pub default_horizon_days: i64,
    pub annual_horizon_years: u32,
    /// Upper bound on the events one creation request may produce
    pub max_occurrences: usize,
}

impl BookingConfig {
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn completion_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.completion_sweep_interval_secs)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            club_booking_limit: 2,
            low_slots_threshold: 2,
            transaction_timeout_ms: 5_000,
            serialization_retries: 0,
            completion_sweep_interval_secs: 300,
            default_horizon_days: 365,
            annual_horizon_years: 10,
            max_occurrences: 1_000,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load settings using the given configuration file base name
    pub fn load_from(file_name: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name(file_name).required(false))
            .add_source(config::Environment::with_prefix("SLOTKEEPER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SlotKeeperError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/slotkeeper".to_string(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_seconds: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                file_prefix: "slotkeeper.log".to_string(),
                json: false,
            },
            booking: BookingConfig::default(),
        }
    }
}
