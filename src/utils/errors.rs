//! Error handling for SlotKeeper
//!
//! This module defines the error taxonomy of the booking engine: validation
//! failures rejected before any transaction, business-rule conflicts rejected
//! inside one, transient concurrency failures that are safe to retry, and
//! not-found lookups.

use thiserror::Error;

/// SQLSTATE codes for failures that leave nothing applied and may be retried
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
/// Raised when `statement_timeout` cancels a statement, e.g. a lock wait
const QUERY_CANCELED: &str = "57014";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Whether a PostgreSQL SQLSTATE reports a transient failure
pub fn is_transient_sqlstate(code: &str) -> bool {
    matches!(code, SERIALIZATION_FAILURE | DEADLOCK_DETECTED | QUERY_CANCELED | LOCK_NOT_AVAILABLE)
}

/// Main error type for SlotKeeper
#[derive(Error, Debug)]
pub enum SlotKeeperError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Booking conflict: {0}")]
    Conflict(#[from] BookingConflict),

    #[error("Transient failure, retry the operation: {0}")]
    Transient(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Predefined event not found: {predefined_event_id}")]
    PredefinedEventNotFound { predefined_event_id: i64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request validation failures, reported before any transaction starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("start date must be in the future")]
    StartDateMustBeInTheFuture,

    #[error("end time must be after start time")]
    EndBeforeStart,

    #[error("recurrence end must not be before the first occurrence")]
    RecurrenceEndBeforeStart,

    #[error("recurrence rule {0} requires repeat days")]
    MissingRepeatDays(String),

    #[error("recurrence rule {0} requires repeat dates")]
    MissingRepeatDates(String),

    #[error("invalid weekday index {0}, expected 0-6")]
    InvalidWeekday(u8),

    #[error("recurrence produced no occurrences")]
    NoOccurrences,

    #[error("recurrence produces more than {0} occurrences")]
    TooManyOccurrences(usize),

    #[error("club events require a title")]
    MissingTitle,

    #[error("course events require a predefined event")]
    MissingPredefinedEvent,

    #[error("club events cannot reference a predefined event")]
    ClubEventWithPredefinedEvent,

    #[error("course event titles derive from their predefined event")]
    TitleDerivedFromPredefinedEvent,

    #[error("total slots must not be negative")]
    NegativeSlots,

    #[error("event recurrence rule does not match {0}")]
    RecurrenceRuleMismatch(String),

    #[error("update request is empty")]
    EmptyUpdate,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::StartDateMustBeInTheFuture => "START_DATE_MUST_BE_IN_THE_FUTURE",
            ValidationError::EndBeforeStart => "END_TIME_BEFORE_START_TIME",
            ValidationError::RecurrenceEndBeforeStart => "RECURRENCE_END_BEFORE_START",
            ValidationError::MissingRepeatDays(_) => "REPEAT_DAYS_REQUIRED",
            ValidationError::MissingRepeatDates(_) => "REPEAT_DATES_REQUIRED",
            ValidationError::InvalidWeekday(_) => "INVALID_WEEKDAY",
            ValidationError::NoOccurrences => "NO_OCCURRENCES",
            ValidationError::TooManyOccurrences(_) => "TOO_MANY_OCCURRENCES",
            ValidationError::MissingTitle => "TITLE_REQUIRED",
            ValidationError::MissingPredefinedEvent => "PREDEFINED_EVENT_REQUIRED",
            ValidationError::ClubEventWithPredefinedEvent => "CLUB_EVENT_WITH_PREDEFINED_EVENT",
            ValidationError::TitleDerivedFromPredefinedEvent => "TITLE_DERIVED_FROM_PREDEFINED_EVENT",
            ValidationError::NegativeSlots => "NEGATIVE_TOTAL_SLOTS",
            ValidationError::RecurrenceRuleMismatch(_) => "RECURRENCE_RULE_MISMATCH",
            ValidationError::EmptyUpdate => "EMPTY_UPDATE",
        }
    }
}

/// Business-rule conflicts detected inside the booking transaction
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingConflict {
    #[error("booking is disabled for this event")]
    BookingDisabled,

    #[error("no more slots available")]
    NoMoreSlots,

    #[error("user is already booked")]
    AlreadyBooked,

    #[error("user is not booked")]
    NotBooked,

    #[error("user is already booked and cannot join the waitlist")]
    AlreadyBookedInWaitlist,

    #[error("user is already in the waitlist")]
    AlreadyInWaitlist,

    #[error("user is not in the waitlist")]
    NotInWaitlist,

    #[error("club booking limit reached")]
    ClubLimitReached,

    #[error("user already holds a booking for this predefined event")]
    AlreadyBookedPredefinedEvent,

    #[error("user calendar is blocked")]
    CalendarBlocked,

    #[error("event has already started")]
    AlreadyStarted,

    #[error("user is not eligible for this event")]
    NotEligible,

    #[error("total slots cannot be less than booked slots")]
    TotalSlotsLessThanBooked,
}

impl BookingConflict {
    pub fn code(&self) -> &'static str {
        match self {
            BookingConflict::BookingDisabled => "BOOKING_DISABLED",
            BookingConflict::NoMoreSlots => "NO_MORE_SLOTS",
            BookingConflict::AlreadyBooked => "ALREADY_BOOKED",
            BookingConflict::NotBooked => "NOT_BOOKED",
            BookingConflict::AlreadyBookedInWaitlist => "ALREADY_BOOKED_IN_WAITLIST",
            BookingConflict::AlreadyInWaitlist => "ALREADY_IN_WAITLIST",
            BookingConflict::NotInWaitlist => "NOT_IN_WAITLIST",
            BookingConflict::ClubLimitReached => "CLUB_BOOKING_LIMIT_REACHED",
            BookingConflict::AlreadyBookedPredefinedEvent => "ALREADY_BOOKED_PREDEFINED_EVENT",
            BookingConflict::CalendarBlocked => "CALENDAR_BLOCKED",
            BookingConflict::AlreadyStarted => "ALREADY_STARTED",
            BookingConflict::NotEligible => "NOT_ELIGIBLE",
            BookingConflict::TotalSlotsLessThanBooked => "TOTAL_SLOTS_LESS_THAN_BOOKED",
        }
    }
}

impl From<sqlx::Error> for SlotKeeperError {
    fn from(error: sqlx::Error) -> Self {
        let transient = match &error {
            sqlx::Error::Database(db_error) => db_error
                .code()
                .filter(|code| is_transient_sqlstate(code))
                .map(|code| format!("{} (SQLSTATE {})", db_error.message(), code)),
            sqlx::Error::PoolTimedOut => Some("connection pool timed out".to_string()),
            _ => None,
        };

        match transient {
            Some(message) => SlotKeeperError::Transient(message),
            None => SlotKeeperError::Database(error),
        }
    }
}

/// Result type alias for SlotKeeper operations
pub type Result<T> = std::result::Result<T, SlotKeeperError>;

/// Broad error category callers dispatch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Transient,
    NotFound,
    Internal,
}

impl SlotKeeperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SlotKeeperError::Validation(_) => ErrorKind::Validation,
            SlotKeeperError::Conflict(_) | SlotKeeperError::PermissionDenied(_) => ErrorKind::Conflict,
            SlotKeeperError::Transient(_) => ErrorKind::Transient,
            SlotKeeperError::UserNotFound { .. }
            | SlotKeeperError::EventNotFound { .. }
            | SlotKeeperError::PredefinedEventNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Stable code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            SlotKeeperError::Validation(e) => e.code(),
            SlotKeeperError::Conflict(e) => e.code(),
            SlotKeeperError::PermissionDenied(_) => "PERMISSION_DENIED",
            SlotKeeperError::UserNotFound { .. } => "USER_NOT_FOUND",
            SlotKeeperError::EventNotFound { .. } => "EVENT_NOT_FOUND",
            SlotKeeperError::PredefinedEventNotFound { .. } => "PREDEFINED_EVENT_NOT_FOUND",
            _ => "GENERAL_ERROR",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SlotKeeperError::Transient(_))
    }

    /// Check if the error is recoverable by retrying the same call
    pub fn is_recoverable(&self) -> bool {
        match self {
            SlotKeeperError::Transient(_) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SlotKeeperError::Database(_) => ErrorSeverity::Critical,
            SlotKeeperError::Migration(_) => ErrorSeverity::Critical,
            SlotKeeperError::Config(_) => ErrorSeverity::Critical,
            SlotKeeperError::Transient(_) => ErrorSeverity::Warning,
            SlotKeeperError::PermissionDenied(_) => ErrorSeverity::Warning,
            SlotKeeperError::Validation(_) => ErrorSeverity::Info,
            SlotKeeperError::Conflict(_) => ErrorSeverity::Info,
            SlotKeeperError::UserNotFound { .. } => ErrorSeverity::Info,
            SlotKeeperError::EventNotFound { .. } => ErrorSeverity::Info,
            SlotKeeperError::PredefinedEventNotFound { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// The conflict carried by this error, if it is one
    pub fn conflict(&self) -> Option<BookingConflict> {
        match self {
            SlotKeeperError::Conflict(conflict) => Some(*conflict),
            _ => None,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_codes_are_reported_verbatim() {
        let error: SlotKeeperError = BookingConflict::NoMoreSlots.into();
        assert_eq!(error.code(), "NO_MORE_SLOTS");
        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_validation_code() {
        let error: SlotKeeperError = ValidationError::StartDateMustBeInTheFuture.into();
        assert_eq!(error.code(), "START_DATE_MUST_BE_IN_THE_FUTURE");
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_transient_is_general_error_and_retryable() {
        let error = SlotKeeperError::Transient("timeout".to_string());
        assert_eq!(error.code(), "GENERAL_ERROR");
        assert!(error.is_transient());
        assert!(error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_pool_timeout_maps_to_transient() {
        let error: SlotKeeperError = sqlx::Error::PoolTimedOut.into();
        assert!(error.is_transient());
    }

    #[test]
    fn test_statement_timeouts_and_races_are_transient_sqlstates() {
        for code in ["40001", "40P01", "57014", "55P03"] {
            assert!(is_transient_sqlstate(code), "{} should be transient", code);
        }
        // Unique violation and foreign key violation are real failures
        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("23503"));
    }

    #[test]
    fn test_not_found_kind() {
        let error = SlotKeeperError::EventNotFound { event_id: 7 };
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.code(), "EVENT_NOT_FOUND");
        assert_eq!(error.to_string(), "Event not found: 7");
    }
}
