//! Hash-keyed comparison of two calendars.
//!
//! Used when reconciling a local calendar with an independently maintained
//! copy: entries are matched purely by their hash over a field subset, so an
//! entry edited in either store shows up as one removal plus one addition.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::db::calendar::{Calendar, EntryRef};
use crate::models::entry::FieldSubset;

/// Entries that ended longer than this before the cutoff are left out.
pub const CUTOFF_BUFFER_MINUTES: i64 = 35;

/// Hashes present in only one of two calendars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeymapDiff {
    /// In the new calendar only
    pub added: Vec<(String, EntryRef)>,
    /// In the old calendar only
    pub removed: Vec<(String, EntryRef)>,
}

impl KeymapDiff {
    /// Compare `old` against `new` over `subset`.
    ///
    /// With a `cutoff`, entries whose `utc_stop` is more than
    /// [`CUTOFF_BUFFER_MINUTES`] before it are ignored on both sides.
    pub fn between(
        old: &mut Calendar,
        new: &mut Calendar,
        subset: &FieldSubset,
        cutoff: Option<DateTime<Utc>>,
    ) -> Self {
        let old_map = current_keys(old, subset, cutoff);
        let new_map = current_keys(new, subset, cutoff);

        Self {
            added: only_in(&new_map, &old_map),
            removed: only_in(&old_map, &new_map),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn current_keys(
    calendar: &mut Calendar,
    subset: &FieldSubset,
    cutoff: Option<DateTime<Utc>>,
) -> HashMap<String, EntryRef> {
    let earliest = cutoff.map(|t| t - Duration::minutes(CUTOFF_BUFFER_MINUTES));
    let keymap = calendar.make_hash_keymap(subset).clone();
    keymap
        .into_iter()
        .filter(|(_, at)| match (earliest, calendar.entry(&at.day, at.index)) {
            (Some(earliest), Some(entry)) => entry.utc_stop.map_or(true, |stop| stop >= earliest),
            _ => true,
        })
        .collect()
}

fn only_in(
    these: &HashMap<String, EntryRef>,
    others: &HashMap<String, EntryRef>,
) -> Vec<(String, EntryRef)> {
    let hashes: BTreeSet<&String> = these.keys().filter(|h| !others.contains_key(*h)).collect();
    let mut found: Vec<(String, EntryRef)> = hashes
        .into_iter()
        .map(|hash| (hash.clone(), these[hash].clone()))
        .collect();
    found.sort_by(|a, b| a.1.cmp(&b.1));
    found
}
