//! Observation entries.
//!
//! Callers describe an observation with an [`EntryFields`] dictionary of
//! loosely typed text values (as they arrive from a GUI form, a CLI or a
//! snapshot file). An [`Entry`] is the coerced, typed record built from it,
//! carrying a validity flag and a content hash over a chosen field subset.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use qtty::HourAngles;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::codec::{
    decode_instant, decode_recurring, encode_instant, encode_lst, encode_recurring, tabulate,
};
use super::location::{Location, SiteRegistry};
use super::time::{day_key, isoformat, local_sidereal_time};
use crate::db::checksum::entry_digest;
use crate::db::error::LocationError;

pub const DEFAULT_COMMENSAL: &str = "primary";
pub const DEFAULT_EVENT_ID: &str = "AOC";

/// Named entry fields, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryField {
    Program,
    Pid,
    UtcStart,
    UtcStop,
    LstStart,
    LstStop,
    Observer,
    Email,
    Note,
    Commensal,
    Recurring,
    Location,
    EventId,
}

impl EntryField {
    pub const ALL: [EntryField; 13] = [
        EntryField::Program,
        EntryField::Pid,
        EntryField::UtcStart,
        EntryField::UtcStop,
        EntryField::LstStart,
        EntryField::LstStop,
        EntryField::Observer,
        EntryField::Email,
        EntryField::Note,
        EntryField::Commensal,
        EntryField::Recurring,
        EntryField::Location,
        EntryField::EventId,
    ];

    /// Columns shown by default in day listings.
    pub const SHORT: [EntryField; 8] = [
        EntryField::Program,
        EntryField::Pid,
        EntryField::UtcStart,
        EntryField::UtcStop,
        EntryField::LstStart,
        EntryField::LstStop,
        EntryField::Observer,
        EntryField::Commensal,
    ];

    /// Fields whose values make an entry a true duplicate within one calendar.
    pub const UNIQUE: [EntryField; 7] = [
        EntryField::Program,
        EntryField::Pid,
        EntryField::UtcStart,
        EntryField::UtcStop,
        EntryField::Observer,
        EntryField::Note,
        EntryField::Commensal,
    ];

    /// Fields that survive a round trip through an external calendar.
    pub const CROSS_SYSTEM: [EntryField; 3] = [
        EntryField::Program,
        EntryField::UtcStart,
        EntryField::UtcStop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntryField::Program => "program",
            EntryField::Pid => "pid",
            EntryField::UtcStart => "utc_start",
            EntryField::UtcStop => "utc_stop",
            EntryField::LstStart => "lst_start",
            EntryField::LstStop => "lst_stop",
            EntryField::Observer => "observer",
            EntryField::Email => "email",
            EntryField::Note => "note",
            EntryField::Commensal => "commensal",
            EntryField::Recurring => "recurring",
            EntryField::Location => "location",
            EntryField::EventId => "event_id",
        }
    }

    /// Look up a field by name; `name` and `state` are accepted aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "name" => Some(EntryField::Program),
            "state" => Some(EntryField::Commensal),
            _ => Self::ALL.into_iter().find(|field| field.name() == name),
        }
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named selection of fields used for hashing and listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldSubset {
    #[default]
    Unique,
    CrossSystem,
    Short,
    All,
    Custom(Vec<EntryField>),
}

impl FieldSubset {
    pub fn fields(&self) -> &[EntryField] {
        match self {
            FieldSubset::Unique => &EntryField::UNIQUE,
            FieldSubset::CrossSystem => &EntryField::CROSS_SYSTEM,
            FieldSubset::Short => &EntryField::SHORT,
            FieldSubset::All => &EntryField::ALL,
            FieldSubset::Custom(fields) => fields,
        }
    }

    /// Parse `unique`, `web`/`cross`, `short`, `all` or a comma list of field names.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "unique" => Some(FieldSubset::Unique),
            "web" | "cross" | "cross_system" => Some(FieldSubset::CrossSystem),
            "short" => Some(FieldSubset::Short),
            "all" => Some(FieldSubset::All),
            list => list
                .split(',')
                .map(EntryField::from_name)
                .collect::<Option<Vec<_>>>()
                .map(FieldSubset::Custom),
        }
    }
}

/// Recurrence given either as a list or as comma-joined text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecurringInput {
    List(Vec<String>),
    Text(String),
}

impl RecurringInput {
    fn values(&self) -> Vec<String> {
        match self {
            RecurringInput::List(values) => values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            RecurringInput::Text(text) => decode_recurring(text),
        }
    }
}

/// Raw field dictionary for creating or updating an entry.
///
/// Every value is optional; only the keys present take effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFields {
    #[serde(alias = "name", deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub utc_start: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub utc_stop: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub lst_start: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub lst_stop: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub observer: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(alias = "state", deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub commensal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<RecurringInput>,
    /// Site name, `lat=..,lon=..` text, or a legacy JSON object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// Keys with no matching field
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Accept strings, numbers and booleans as text; `null` as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

impl EntryFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` text pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut fields = Self::default();
        for (key, value) in pairs {
            fields.set(key.as_ref(), value);
        }
        fields
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value by key. Returns `false` when the key names no field, in
    /// which case the value lands in `extra`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let slot = match key.trim().to_ascii_lowercase().as_str() {
            "created" => &mut self.created,
            "modified" => &mut self.modified,
            _ => match EntryField::from_name(key) {
                Some(EntryField::Program) => &mut self.program,
                Some(EntryField::Pid) => &mut self.pid,
                Some(EntryField::UtcStart) => &mut self.utc_start,
                Some(EntryField::UtcStop) => &mut self.utc_stop,
                Some(EntryField::LstStart) => &mut self.lst_start,
                Some(EntryField::LstStop) => &mut self.lst_stop,
                Some(EntryField::Observer) => &mut self.observer,
                Some(EntryField::Email) => &mut self.email,
                Some(EntryField::Note) => &mut self.note,
                Some(EntryField::Commensal) => &mut self.commensal,
                Some(EntryField::EventId) => &mut self.event_id,
                Some(EntryField::Recurring) => {
                    self.recurring = Some(RecurringInput::Text(value));
                    return true;
                }
                Some(EntryField::Location) => {
                    self.location = Some(Value::String(value));
                    return true;
                }
                None => {
                    self.extra.insert(key.to_string(), Value::String(value));
                    return false;
                }
            },
        };
        *slot = Some(value);
        true
    }
}

/// One scheduled observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub program: String,
    pub pid: String,
    pub utc_start: Option<DateTime<Utc>>,
    pub utc_stop: Option<DateTime<Utc>>,
    /// Derived from `utc_start` and the site longitude
    pub lst_start: Option<HourAngles>,
    /// Derived from `utc_stop` and the site longitude
    pub lst_stop: Option<HourAngles>,
    pub observer: String,
    pub email: String,
    pub note: String,
    pub commensal: String,
    pub recurring: Vec<String>,
    pub location: Location,
    pub event_id: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub valid: bool,
    /// `ok`, or the reasons the entry is invalid (one per line)
    pub msg: String,
    /// Unrecognized keys given at creation
    pub extra: BTreeMap<String, Value>,
}

impl Entry {
    /// Coerce a field dictionary into a new entry.
    ///
    /// `created`/`modified` are taken from the fields when present (as when
    /// loading a snapshot), otherwise both are `now`. Only an unresolvable
    /// location is an error; bad dates leave the entry invalid.
    pub fn new(
        fields: &EntryFields,
        registry: &SiteRegistry,
        default_location: &Location,
        now: DateTime<Utc>,
    ) -> Result<Self, LocationError> {
        let stamp = |text: &Option<String>| text.as_deref().and_then(|t| decode_instant(t, now));
        let created = stamp(&fields.created).unwrap_or(now);

        let mut entry = Self {
            program: String::new(),
            pid: String::new(),
            utc_start: None,
            utc_stop: None,
            lst_start: None,
            lst_stop: None,
            observer: String::new(),
            email: String::new(),
            note: String::new(),
            commensal: DEFAULT_COMMENSAL.to_string(),
            recurring: Vec::new(),
            location: default_location.clone(),
            event_id: DEFAULT_EVENT_ID.to_string(),
            created,
            modified: created,
            valid: false,
            msg: String::new(),
            extra: fields.extra.clone(),
        };
        entry.apply(fields, registry, now)?;
        entry.modified = stamp(&fields.modified).unwrap_or(now);
        Ok(entry)
    }

    /// Merge `fields` into this entry. Unknown keys are ignored; `modified`
    /// becomes `now` and the sidereal times are recomputed.
    pub fn update(
        &mut self,
        fields: &EntryFields,
        registry: &SiteRegistry,
        now: DateTime<Utc>,
    ) -> Result<(), LocationError> {
        self.apply(fields, registry, now)?;
        self.modified = now;
        Ok(())
    }

    fn apply(
        &mut self,
        fields: &EntryFields,
        registry: &SiteRegistry,
        now: DateTime<Utc>,
    ) -> Result<(), LocationError> {
        // Resolve first so a bad site leaves the entry untouched.
        let location = match &fields.location {
            None | Some(Value::Null) => None,
            Some(value) => Some(registry.resolve_value(value)?),
        };

        let texts = [
            (&mut self.program, &fields.program),
            (&mut self.pid, &fields.pid),
            (&mut self.observer, &fields.observer),
            (&mut self.email, &fields.email),
            (&mut self.note, &fields.note),
            (&mut self.commensal, &fields.commensal),
            (&mut self.event_id, &fields.event_id),
        ];
        for (slot, value) in texts {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }

        let mut problems = Vec::new();
        let instants = [
            (&mut self.utc_start, &fields.utc_start, EntryField::UtcStart),
            (&mut self.utc_stop, &fields.utc_stop, EntryField::UtcStop),
        ];
        for (slot, text, field) in instants {
            let Some(text) = text else { continue };
            match decode_instant(text, now) {
                Some(instant) => *slot = Some(instant),
                None => problems.push(format!("Invalid {field} - {text}")),
            }
        }

        if let Some(recurring) = &fields.recurring {
            self.recurring = recurring.values();
        }
        if let Some(location) = location {
            self.location = location;
        }

        self.refresh_lst();
        self.revalidate(problems);
        Ok(())
    }

    /// Recompute sidereal times from the UTC window and site.
    pub fn refresh_lst(&mut self) {
        let longitude = self.location.longitude;
        self.lst_start = self.utc_start.map(|t| local_sidereal_time(t, longitude));
        self.lst_stop = self.utc_stop.map(|t| local_sidereal_time(t, longitude));
    }

    fn revalidate(&mut self, mut problems: Vec<String>) {
        match (self.utc_start, self.utc_stop) {
            (Some(start), Some(stop)) if start > stop => problems.push(format!(
                "utc_stop {} precedes utc_start {}",
                isoformat(stop),
                isoformat(start)
            )),
            (start, stop) => {
                if start.is_none() {
                    problems.push("Invalid utc_start - None".to_string());
                }
                if stop.is_none() {
                    problems.push("Invalid utc_stop - None".to_string());
                }
            }
        }

        let descriptive = [&self.program, &self.observer, &self.note, &self.commensal];
        if descriptive.iter().all(|value| value.trim().is_empty()) {
            problems.push("Need at least one non-Time entry".to_string());
        }

        self.valid = problems.is_empty();
        self.msg = if self.valid {
            "ok".to_string()
        } else {
            problems.join("\n")
        };
    }

    /// Printable value of one field.
    pub fn printable(&self, field: EntryField) -> String {
        match field {
            EntryField::Program => self.program.clone(),
            EntryField::Pid => self.pid.clone(),
            EntryField::UtcStart => encode_instant(self.utc_start),
            EntryField::UtcStop => encode_instant(self.utc_stop),
            EntryField::LstStart => encode_lst(self.lst_start),
            EntryField::LstStop => encode_lst(self.lst_stop),
            EntryField::Observer => self.observer.clone(),
            EntryField::Email => self.email.clone(),
            EntryField::Note => self.note.clone(),
            EntryField::Commensal => self.commensal.clone(),
            EntryField::Recurring => encode_recurring(&self.recurring),
            EntryField::Location => self.location.encode(),
            EntryField::EventId => self.event_id.clone(),
        }
    }

    pub fn row(&self, subset: &FieldSubset) -> Vec<String> {
        subset
            .fields()
            .iter()
            .map(|field| self.printable(*field))
            .collect()
    }

    /// Identity hash over the printable values of `subset`.
    pub fn hash(&self, subset: &FieldSubset) -> String {
        let row = self.row(subset);
        entry_digest(row.iter().map(String::as_str))
    }

    /// Day key of `utc_start`.
    pub fn day_key(&self) -> Option<String> {
        self.utc_start.map(day_key)
    }

    /// True when `utc_stop` falls on a later UTC day than `utc_start`.
    pub fn straddles(&self) -> bool {
        match (self.utc_start, self.utc_stop) {
            (Some(start), Some(stop)) => stop.date_naive() > start.date_naive(),
            _ => false,
        }
    }

    /// Closed-interval overlap of the UTC windows.
    pub fn overlaps(&self, other: &Entry) -> bool {
        match (self.utc_start, self.utc_stop, other.utc_start, other.utc_stop) {
            (Some(start), Some(stop), Some(other_start), Some(other_stop)) => {
                start <= other_stop && other_start <= stop
            }
            _ => false,
        }
    }

    /// Printable field dictionary, including audit stamps and extra keys.
    pub fn to_fields(&self) -> EntryFields {
        let text = |field| Some(self.printable(field)).filter(|v| !v.is_empty());
        EntryFields {
            program: Some(self.program.clone()),
            pid: Some(self.pid.clone()),
            utc_start: text(EntryField::UtcStart),
            utc_stop: text(EntryField::UtcStop),
            lst_start: text(EntryField::LstStart),
            lst_stop: text(EntryField::LstStop),
            observer: Some(self.observer.clone()),
            email: Some(self.email.clone()),
            note: Some(self.note.clone()),
            commensal: Some(self.commensal.clone()),
            recurring: Some(RecurringInput::Text(encode_recurring(&self.recurring))),
            location: Some(Value::String(self.location.encode())),
            event_id: Some(self.event_id.clone()),
            created: Some(isoformat(self.created)),
            modified: Some(isoformat(self.modified)),
            extra: self.extra.clone(),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.utc_start {
            Some(start) => writeln!(f, "CALENDAR ENTRY {}", start.year())?,
            None => writeln!(f, "BLANK ENTRY")?,
        }
        write!(f, "created: {}", isoformat(self.created))?;
        if self.modified != self.created {
            write!(f, "  --  modified: {}", isoformat(self.modified))?;
        }
        writeln!(f, "\n")?;

        let rows: Vec<Vec<String>> = EntryField::ALL
            .iter()
            .map(|field| vec![field.name().to_string(), self.printable(*field)])
            .collect();
        writeln!(f, "{}", tabulate(&["Field", "Value"], &rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_and_aliases() {
        assert_eq!(EntryField::from_name("utc_start"), Some(EntryField::UtcStart));
        assert_eq!(EntryField::from_name("Name"), Some(EntryField::Program));
        assert_eq!(EntryField::from_name("state"), Some(EntryField::Commensal));
        assert_eq!(EntryField::from_name("colour"), None);
        assert_eq!(EntryField::EventId.to_string(), "event_id");
    }

    #[test]
    fn test_subset_parse() {
        assert_eq!(FieldSubset::parse("web"), Some(FieldSubset::CrossSystem));
        assert_eq!(
            FieldSubset::parse("program,pid"),
            Some(FieldSubset::Custom(vec![EntryField::Program, EntryField::Pid]))
        );
        assert_eq!(FieldSubset::parse("program,bogus"), None);
        assert_eq!(FieldSubset::default().fields().len(), 7);
    }

    #[test]
    fn test_fields_set_reports_unknown_keys() {
        let mut fields = EntryFields::new();
        assert!(fields.set("name", "survey"));
        assert!(fields.set("recurring", "mon,tue"));
        assert!(!fields.set("telescope", "dish-3"));
        assert_eq!(fields.program.as_deref(), Some("survey"));
        assert_eq!(
            fields.extra.get("telescope"),
            Some(&Value::String("dish-3".to_string()))
        );
    }

    #[test]
    fn test_fields_deserialize_leniently() {
        let fields: EntryFields = serde_json::from_value(serde_json::json!({
            "name": "survey",
            "pid": 42,
            "utc_stop": null,
            "state": "commensal",
            "recurring": ["mon", "wed"],
            "telescope": "dish-3"
        }))
        .unwrap();
        assert_eq!(fields.program.as_deref(), Some("survey"));
        assert_eq!(fields.pid.as_deref(), Some("42"));
        assert_eq!(fields.utc_stop, None);
        assert_eq!(fields.commensal.as_deref(), Some("commensal"));
        assert_eq!(
            fields.recurring,
            Some(RecurringInput::List(vec!["mon".into(), "wed".into()]))
        );
        assert!(fields.extra.contains_key("telescope"));
    }
}
