//! # obscal
//!
//! Per-day observation calendar for a radio telescope.
//!
//! Observations are stored as entries bucketed by the UTC day they start on,
//! persisted as one JSON snapshot per year. The crate checks new entries for
//! duplicates and overlaps, can place an observation around a source's
//! transit, and draws a day as a text timeline against UTC, a civil timezone
//! and Local Sidereal Time.
//!
//! ## Architecture
//!
//! - [`models`]: date expressions and sidereal time, printable field codecs,
//!   observing sites and the [`Entry`](models::entry::Entry) record
//! - [`db`]: the [`Calendar`](db::calendar::Calendar) aggregate, JSON
//!   snapshots, configuration and errors
//! - [`services`]: visibility-window scheduling, the text timeline and
//!   hash-keyed calendar comparison
//!
//! ## Logging
//!
//! The library logs through the `log` facade and installs no logger of its
//! own; the owning process picks the subscriber.

pub mod db;
pub mod models;
pub mod services;

pub use db::calendar::{add_entry_to_file, Calendar, ConflictReport, EntryRef, ScheduleRequest};
pub use db::config::CalendarConfig;
pub use db::error::{CalendarError, CalendarResult};
pub use models::entry::{Entry, EntryField, EntryFields, FieldSubset};
