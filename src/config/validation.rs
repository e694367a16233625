//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{SlotKeeperError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_logging_config(&settings.logging)?;
    validate_booking_config(&settings.booking)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SlotKeeperError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(SlotKeeperError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(SlotKeeperError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(SlotKeeperError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(SlotKeeperError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    if config.file_prefix.is_empty() {
        return Err(SlotKeeperError::Config(
            "Log file prefix is required".to_string()
        ));
    }

    Ok(())
}

/// Validate booking engine configuration
fn validate_booking_config(config: &super::BookingConfig) -> Result<()> {
    if config.club_booking_limit < 1 {
        return Err(SlotKeeperError::Config(
            "Club booking limit must be at least 1".to_string()
        ));
    }

    if config.low_slots_threshold < 0 {
        return Err(SlotKeeperError::Config(
            "Low slots threshold cannot be negative".to_string()
        ));
    }

    if config.transaction_timeout_ms == 0 {
        return Err(SlotKeeperError::Config(
            "Transaction timeout must be greater than 0".to_string()
        ));
    }

    if config.completion_sweep_interval_secs == 0 {
        return Err(SlotKeeperError::Config(
            "Completion sweep interval must be greater than 0".to_string()
        ));
    }

    if config.default_horizon_days < 1 || config.annual_horizon_years < 1 {
        return Err(SlotKeeperError::Config(
            "Recurrence horizons must be positive".to_string()
        ));
    }

    if config.max_occurrences == 0 {
        return Err(SlotKeeperError::Config(
            "Max occurrences must be greater than 0".to_string()
        ));
    }

    Ok(())
}
