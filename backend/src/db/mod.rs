//! Calendar storage.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Callers (CLI, GUI, sync adapter)             │
//! └───────────────────┬──────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────┐
//! │  calendar.rs - day buckets, straddles,        │
//! │  conflicts, audit lists                       │
//! └───────────────────┬──────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────┐
//! │  snapshot.rs - one JSON file per year         │
//! └──────────────────────────────────────────────┘
//! ```

pub mod calendar;
pub mod checksum;
pub mod config;
pub mod error;
pub mod snapshot;

#[cfg(test)]
mod calendar_tests;

pub use calendar::{add_entry_to_file, Calendar, ConflictReport, EntryRef, ScheduleRequest};
pub use checksum::entry_digest;
pub use config::CalendarConfig;
pub use error::{CalendarError, CalendarResult, LocationError, TimeError};
pub use snapshot::Snapshot;
