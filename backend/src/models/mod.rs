pub mod codec;
pub mod entry;
pub mod location;
pub mod time;

#[cfg(test)]
mod time_tests;

pub use entry::{Entry, EntryField, EntryFields, FieldSubset};
pub use location::{Location, SiteRegistry};
