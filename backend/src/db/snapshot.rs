//! JSON snapshot files.
//!
//! A snapshot is one JSON object. The meta keys `created`, `modified`,
//! `added`, `removed` and `updated` hold store-level audit data; every other
//! key is a `YYYY-MM-DD` day mapping to an array of entry objects. Files are
//! always rewritten whole.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};
use serde_json::{Map, Value};

use super::error::CalendarResult;
use crate::models::entry::EntryFields;
use crate::models::time::parse_day_key;

pub const META_FIELDS: [&str; 5] = ["created", "modified", "added", "removed", "updated"];

/// Parsed contents of a snapshot file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub created: Option<String>,
    pub modified: Option<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Old cross-system hash to new
    pub updated: BTreeMap<String, String>,
    /// Entries under their outer day key, in file order
    pub days: BTreeMap<String, Vec<EntryFields>>,
}

impl Snapshot {
    /// Parse snapshot text, skipping (with a warning) anything unreadable.
    pub fn parse(text: &str) -> CalendarResult<Self> {
        let top: Map<String, Value> = serde_json::from_str(text)?;
        let mut snapshot = Snapshot::default();

        for (key, value) in top {
            match key.as_str() {
                "created" => snapshot.created = text_value(value),
                "modified" => snapshot.modified = text_value(value),
                "added" => snapshot.added = string_list(value),
                "removed" => snapshot.removed = string_list(value),
                "updated" => snapshot.updated = string_map(value),
                day => {
                    if parse_day_key(day).is_none() {
                        warn!("Skipping snapshot key '{}': not a day", day);
                        continue;
                    }
                    let Value::Array(items) = value else {
                        warn!("Skipping day {}: expected a list of entries", day);
                        continue;
                    };
                    let bucket = snapshot.days.entry(day.to_string()).or_default();
                    for (i, item) in items.into_iter().enumerate() {
                        match serde_json::from_value::<EntryFields>(item) {
                            Ok(fields) => bucket.push(fields),
                            Err(e) => warn!("Skipping entry {}:{}: {}", day, i, e),
                        }
                    }
                }
            }
        }
        Ok(snapshot)
    }

    /// Read a snapshot file. `Ok(None)` when the file does not exist.
    pub fn read<P: AsRef<Path>>(path: P) -> CalendarResult<Option<Self>> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No calendar file was found at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        info!("Reading {}", path.display());
        Self::parse(&text).map(Some)
    }

    /// JSON value of the whole snapshot; empty days are left out.
    pub fn to_value(&self) -> CalendarResult<Value> {
        let mut top = Map::new();
        top.insert("created".to_string(), optional_text(&self.created));
        top.insert("modified".to_string(), optional_text(&self.modified));
        top.insert("added".to_string(), serde_json::to_value(&self.added)?);
        top.insert("removed".to_string(), serde_json::to_value(&self.removed)?);
        top.insert("updated".to_string(), serde_json::to_value(&self.updated)?);
        for (day, entries) in &self.days {
            if !entries.is_empty() {
                top.insert(day.clone(), serde_json::to_value(entries)?);
            }
        }
        Ok(Value::Object(top))
    }

    /// Write the whole snapshot to `path` (no atomic rename).
    pub fn write<P: AsRef<Path>>(&self, path: P) -> CalendarResult<()> {
        let path = path.as_ref();
        info!("Writing {}", path.display());
        let text = serde_json::to_string_pretty(&self.to_value()?)?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn text_value(value: Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text),
        _ => None,
    }
}

fn optional_text(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(text_value).collect(),
        _ => Vec::new(),
    }
}

fn string_map(value: Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, value)| Some((key, text_value(value)?)))
            .collect(),
        _ => BTreeMap::new(),
    }
}
