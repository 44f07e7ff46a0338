//! Error types for calendar operations.
//!
//! Most calendar mutations report ordinary failures as `Ok(false)` plus a log
//! line. The variants here are the failures that have no sensible default:
//! unresolvable timezones and sites, unreadable snapshots and bad config.

use thiserror::Error;

/// Result type for calendar operations
pub type CalendarResult<T> = Result<T, CalendarError>;

/// Timezone resolution failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeError {
    /// Name is neither `sys`, an IANA zone, nor a known abbreviation
    #[error("Invalid timezone designation: {0}")]
    UnknownTimezone(String),
}

/// Observing-site resolution failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// Name is not present in the site registry
    #[error("Unknown location: {0}")]
    UnknownSite(String),

    /// `lat=..,lon=..` text or JSON object could not be read
    #[error("Malformed location '{input}': {reason}")]
    Malformed { input: String, reason: String },
}

/// Errors that can occur when using the calendar.
#[derive(Error, Debug)]
pub enum CalendarError {
    /// Timezone could not be resolved
    #[error(transparent)]
    Time(#[from] TimeError),

    /// Site could not be resolved
    #[error(transparent)]
    Location(#[from] LocationError),

    /// Snapshot has no file associated with it
    #[error("No file associated with calendar")]
    NoFile,

    /// I/O error (snapshot read/write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file or environment error
    #[error("Configuration error: {0}")]
    Config(String),
}
