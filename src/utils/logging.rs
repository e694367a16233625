//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the booking engine.

use tracing::{info, warn, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use crate::config::LoggingConfig;
use crate::models::{BookingState, NotificationFact};
use crate::utils::errors::{Result, SlotKeeperError};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer and must live as long as the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| SlotKeeperError::Config(format!("Invalid log filter: {}", e)))?;

    let json_file = config.json.then(|| fmt::layer().json().with_writer(non_blocking.clone()));
    let plain_file = (!config.json).then(|| fmt::layer().with_ansi(false).with_writer(non_blocking));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(json_file)
        .with(plain_file)
        .try_init()
        .map_err(|e| SlotKeeperError::Config(format!("Logging already initialized: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log booking and waitlist transitions with structured data
pub fn log_booking_action(event_id: i64, user_id: i64, actor_id: i64, from: BookingState, to: BookingState) {
    info!(
        event_id = event_id,
        user_id = user_id,
        actor_id = actor_id,
        from = %from,
        to = %to,
        "Booking state changed"
    );
}

/// Log a rejected booking request
pub fn log_booking_rejected(event_id: i64, user_id: i64, code: &str) {
    debug!(
        event_id = event_id,
        user_id = user_id,
        code = code,
        "Booking request rejected"
    );
}

/// Log waitlist promotions
pub fn log_promotion(event_id: i64, user_id: i64, record_id: i64) {
    info!(
        event_id = event_id,
        user_id = user_id,
        record_id = record_id,
        "Waitlisted user promoted"
    );
}

/// Log event capacity changes
pub fn log_capacity_change(event_id: i64, old_slots: i32, new_slots: i32, promoted: usize) {
    info!(
        event_id = event_id,
        old_slots = old_slots,
        new_slots = new_slots,
        promoted = promoted,
        "Event capacity updated"
    );
}

/// Log notification facts leaving the engine
pub fn log_notification_fact(fact: &NotificationFact) {
    info!(
        kind = fact.kind(),
        event_id = fact.event_id(),
        "Notification fact delivered"
    );
}

/// Log transaction retries after serialization failures
pub fn log_transaction_retry(operation: &str, attempt: u32, error: &str) {
    warn!(
        operation = operation,
        attempt = attempt,
        error = error,
        "Retrying transaction after transient failure"
    );
}

/// Log completion sweeps
pub fn log_completion_sweep(marked: u64, duration_ms: u64) {
    if marked > 0 {
        info!(marked = marked, duration_ms = duration_ms, "Completion sweep marked bookings");
    } else {
        debug!(duration_ms = duration_ms, "Completion sweep found nothing to mark");
    }
}
