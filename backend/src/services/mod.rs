//! Computations layered over the calendar: scheduling a source by its
//! visibility, drawing a day's timeline, and comparing two calendars.

pub mod compare;
pub mod timeline;
pub mod visibility;

pub use compare::KeymapDiff;
pub use timeline::{RowHeader, TimelineGraph};
pub use visibility::{altitude_track, select_window, transit_time, utc_from_lst, Target};
