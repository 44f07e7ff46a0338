//! The calendar aggregate.
//!
//! A [`Calendar`] holds every entry of one snapshot file bucketed by the UTC
//! day of its start, plus a straddle index of entries that run past midnight
//! into the following day. Mutations go through [`Calendar::add`],
//! [`Calendar::update`] and [`Calendar::delete`], which keep the
//! cross-system audit lists (`added`, `removed`, `updated`) current.
//!
//! Input problems (missing times, unknown coordinates, duplicates) are
//! reported as `Ok(false)` plus a log line. Only an unresolvable timezone or
//! location, and I/O on explicit reads and writes, produce an `Err`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, error, info, warn};
use qtty::Degrees;
use serde::Serialize;
use serde_json::Value;

use super::config::CalendarConfig;
use super::error::{CalendarError, CalendarResult};
use super::snapshot::Snapshot;
use crate::models::codec::{decode_dec, decode_instant, decode_lst, decode_ra, encode_lst, tabulate};
use crate::models::entry::{Entry, EntryField, EntryFields, FieldSubset};
use crate::models::location::{Location, SiteRegistry};
use crate::models::time::{day_key, day_start, interpret_date, isoformat, parse_day_key};
use crate::services::timeline::{RowHeader, TimelineGraph};
use crate::services::visibility::{
    altitude_track, select_window, utc_from_lst, Target, DEFAULT_DURATION_HOURS,
    DEFAULT_ELEVATION_LIMIT_DEG, SCHEDULE_SAMPLE_MINUTES,
};

/// Storage coordinate of an entry: day bucket and position in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryRef {
    pub day: String,
    pub index: usize,
}

impl EntryRef {
    pub fn new(day: impl Into<String>, index: usize) -> Self {
        Self {
            day: day.into(),
            index,
        }
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.day, self.index)
    }
}

/// Bucket indices that clash with a candidate entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    /// Same unique hash
    pub duplicate: Vec<usize>,
    /// Overlapping window, different hash
    pub conflict: Vec<usize>,
}

impl ConflictReport {
    pub fn is_clear(&self) -> bool {
        self.duplicate.is_empty() && self.conflict.is_empty()
    }
}

/// One line of a sorted day.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedEntry<'a> {
    /// Bucket index, or `-1, -2, ...` for entries carried over from earlier days
    pub display_index: i64,
    pub location: EntryRef,
    pub entry: &'a Entry,
}

/// A day's entries (straddles included) ordered by `(utc_start, utc_stop)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedDay<'a> {
    pub day: String,
    pub entries: Vec<SortedEntry<'a>>,
}

impl SortedDay<'_> {
    /// Sorted position to true storage coordinate.
    pub fn index_map(&self) -> BTreeMap<usize, EntryRef> {
        self.entries
            .iter()
            .enumerate()
            .map(|(position, sorted)| (position, sorted.location.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A "schedule by source" request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    /// Right ascension in hours, decimal or sexagesimal
    pub ra: Option<String>,
    /// Declination in degrees, decimal or sexagesimal
    pub dec: Option<String>,
    /// Label used for the program and note
    pub source: Option<String>,
    /// UTC day, as a date expression
    pub day: String,
    pub duration_hours: f64,
    pub elevation_limit_deg: f64,
}

impl Default for ScheduleRequest {
    fn default() -> Self {
        Self {
            ra: None,
            dec: None,
            source: None,
            day: "now".to_string(),
            duration_hours: DEFAULT_DURATION_HOURS,
            elevation_limit_deg: DEFAULT_ELEVATION_LIMIT_DEG,
        }
    }
}

impl ScheduleRequest {
    pub fn new(ra: impl Into<String>, dec: impl Into<String>) -> Self {
        Self {
            ra: Some(ra.into()),
            dec: Some(dec.into()),
            ..Self::default()
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn day(mut self, day: impl Into<String>) -> Self {
        self.day = day.into();
        self
    }

    pub fn duration_hours(mut self, hours: f64) -> Self {
        self.duration_hours = hours;
        self
    }

    pub fn elevation_limit_deg(mut self, degrees: f64) -> Self {
        self.elevation_limit_deg = degrees;
        self
    }
}

/// Day-indexed store of observation entries.
#[derive(Debug, Clone)]
pub struct Calendar {
    events: BTreeMap<String, Vec<Entry>>,
    straddle: BTreeMap<String, Vec<EntryRef>>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    added: Vec<String>,
    removed: Vec<String>,
    updated: BTreeMap<String, String>,
    hashmap: HashMap<String, EntryRef>,
    location: Location,
    registry: SiteRegistry,
    calfile: Option<PathBuf>,
    results: ConflictReport,
    most_recent: Option<Entry>,
    skip_duplicates: bool,
    timezone: String,
    graph_interval_min: f64,
}

impl Calendar {
    /// Empty calendar with no file behind it.
    ///
    /// Fails when the configured default site cannot be resolved.
    pub fn new(config: &CalendarConfig) -> CalendarResult<Self> {
        let registry = SiteRegistry::with_sites(&config.sites);
        let location = registry.resolve(&config.location)?;
        let now = Utc::now();

        Ok(Self {
            events: BTreeMap::new(),
            straddle: BTreeMap::new(),
            created: now,
            modified: now,
            added: Vec::new(),
            removed: Vec::new(),
            updated: BTreeMap::new(),
            hashmap: HashMap::new(),
            location,
            registry,
            calfile: None,
            results: ConflictReport::default(),
            most_recent: None,
            skip_duplicates: config.skip_duplicates,
            timezone: config.timezone.clone(),
            graph_interval_min: config.graph_interval_min,
        })
    }

    /// Open the snapshot named by `designation` (a `*.json` file or any
    /// date expression, which selects that year's file).
    ///
    /// A missing file gives an empty calendar; with `start_new` an empty
    /// snapshot is written in its place.
    pub fn open(designation: &str, config: &CalendarConfig, start_new: bool) -> CalendarResult<Self> {
        let mut calendar = Self::new(config)?;
        let Some(path) = config.resolve_calfile(designation, Utc::now()) else {
            info!("No file associated with calendar");
            return Ok(calendar);
        };
        calendar.calfile = Some(path.clone());

        match Snapshot::read(&path)? {
            Some(snapshot) => calendar.load(snapshot),
            None if start_new => {
                calendar.write()?;
                info!("Started new calendar at {}", path.display());
            }
            None => {}
        }
        Ok(calendar)
    }

    /// Re-read the snapshot file, rebuilding all in-memory state.
    pub fn refresh(&mut self) -> CalendarResult<()> {
        let path = self.calfile.clone().ok_or(CalendarError::NoFile)?;
        let snapshot = Snapshot::read(&path)?.unwrap_or_default();
        self.load(snapshot);
        Ok(())
    }

    fn load(&mut self, snapshot: Snapshot) {
        let now = Utc::now();
        let stamp = |text: &Option<String>| text.as_deref().and_then(|t| decode_instant(t, now));
        self.created = stamp(&snapshot.created).unwrap_or(now);
        self.modified = stamp(&snapshot.modified).unwrap_or(now);
        self.added = snapshot.added;
        self.removed = snapshot.removed;
        self.updated = snapshot.updated;
        self.events.clear();
        self.hashmap.clear();

        let mut seen = HashSet::new();
        let mut site_from_file = false;
        for (key, entries) in &snapshot.days {
            for (i, fields) in entries.iter().enumerate() {
                let entry = match Entry::new(fields, &self.registry, &self.location, now) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping entry {}:{}: {}", key, i, e);
                        continue;
                    }
                };
                if !seen.insert(entry.hash(&FieldSubset::Unique)) {
                    warn!("Entry {}:{} is a duplicate.", key, i);
                    if self.skip_duplicates {
                        warn!("Skipping entry");
                        continue;
                    }
                }
                if !entry.valid {
                    warn!("Entry {}:{} invalid", key, i);
                }
                let day = match entry.day_key() {
                    Some(day) if day != *key => {
                        warn!("{}:{} in wrong day, moved to {}", key, i, day);
                        day
                    }
                    Some(day) => day,
                    None => key.clone(),
                };
                if entry.valid && !site_from_file {
                    site_from_file = true;
                    info!("Using location {}", entry.location);
                    self.location = entry.location.clone();
                }
                self.events.entry(day).or_default().push(entry);
            }
        }
        self.rebuild_straddle();
    }

    /// Write the snapshot back to its file, stamping `modified`.
    pub fn write(&mut self) -> CalendarResult<()> {
        let path = self.calfile.clone().ok_or(CalendarError::NoFile)?;
        self.write_to(path)
    }

    pub fn write_to<P: AsRef<Path>>(&mut self, path: P) -> CalendarResult<()> {
        self.modified = Utc::now();
        self.to_snapshot().write(path)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            created: Some(isoformat(self.created)),
            modified: Some(isoformat(self.modified)),
            added: self.added.clone(),
            removed: self.removed.clone(),
            updated: self.updated.clone(),
            days: self
                .events
                .iter()
                .map(|(day, entries)| (day.clone(), entries.iter().map(Entry::to_fields).collect()))
                .collect(),
        }
    }

    /// Add a new entry.
    ///
    /// `utc_start` is required. Without a usable `utc_stop`, both
    /// `lst_start` and `lst_stop` must be given; they are converted to UTC on
    /// the day of `utc_start`. Returns `Ok(false)` for unusable input and for
    /// duplicates of an existing entry. Overlaps only warn.
    pub fn add(&mut self, fields: EntryFields) -> CalendarResult<bool> {
        let now = Utc::now();
        let Some(fields) = self.resolve_window(fields, now)? else {
            return Ok(false);
        };
        let entry = Entry::new(&fields, &self.registry, &self.location, now)?;
        self.most_recent = Some(entry.clone());
        self.results = self.conflicts(&entry, true);

        if !self.results.duplicate.is_empty() {
            warn!(
                "Not adding -- duplicate with {}.",
                plural_entries(&self.results.duplicate)
            );
            return Ok(false);
        }
        if !self.results.conflict.is_empty() {
            warn!("Overlaps with {}.", plural_entries(&self.results.conflict));
        }
        if !entry.valid {
            warn!("Entry invalid:\n{}", entry.msg);
        }
        let Some(day) = entry.day_key() else {
            error!("Entry has no utc_start");
            return Ok(false);
        };

        self.added.push(entry.hash(&FieldSubset::CrossSystem));
        self.events.entry(day).or_default().push(entry);
        self.rebuild_straddle();
        Ok(true)
    }

    /// Fill in `utc_start`/`utc_stop`, converting LST bounds when needed.
    fn resolve_window(
        &self,
        mut fields: EntryFields,
        now: DateTime<Utc>,
    ) -> CalendarResult<Option<EntryFields>> {
        let Some(start_text) = fields.utc_start.clone().filter(|t| !t.trim().is_empty()) else {
            error!("Need a utc_start.");
            return Ok(None);
        };
        let Some(start) = decode_instant(&start_text, now) else {
            error!("Invalid utc_start - {}", start_text);
            return Ok(None);
        };

        let stop_text = fields.utc_stop.clone().filter(|t| !t.trim().is_empty());
        if stop_text.as_deref().and_then(|t| decode_instant(t, now)).is_some() {
            return Ok(Some(fields));
        }

        let lst_start = fields.lst_start.as_deref().and_then(decode_lst);
        let lst_stop = fields.lst_stop.as_deref().and_then(decode_lst);
        let (Some(lst_start), Some(lst_stop)) = (lst_start, lst_stop) else {
            if stop_text.is_some() {
                // Stored, but flagged invalid by the entry itself.
                return Ok(Some(fields));
            }
            error!("Need lst limits if no utc_stop");
            return Ok(None);
        };

        let location = match &fields.location {
            None | Some(Value::Null) => self.location.clone(),
            Some(value) => self.registry.resolve_value(value)?,
        };
        let day = start.date_naive();
        let start = utc_from_lst(lst_start, &location, day);
        let mut stop = utc_from_lst(lst_stop, &location, day);
        if stop < start {
            stop = utc_from_lst(lst_stop, &location, (start + Duration::days(1)).date_naive());
        }
        debug!(
            "LST window {} - {} resolved to {} - {}",
            encode_lst(Some(lst_start)),
            encode_lst(Some(lst_stop)),
            isoformat(start),
            isoformat(stop)
        );
        fields.utc_start = Some(isoformat(start));
        fields.utc_stop = Some(isoformat(stop));
        Ok(Some(fields))
    }

    /// Merge `fields` into the entry at `(day, index)`.
    ///
    /// When the new `utc_start` falls on another day the entry is re-added
    /// there and then deleted here, as two separate steps.
    pub fn update(&mut self, day: &str, index: usize, fields: EntryFields) -> CalendarResult<bool> {
        let now = Utc::now();
        let Some(day) = resolve_day(day, now) else {
            warn!("Unreadable day '{}'", day);
            return Ok(false);
        };
        let Some(current) = self.events.get(&day).and_then(|bucket| bucket.get(index)) else {
            warn!("{}, {} not found.", day, index);
            return Ok(false);
        };

        let old_cross = current.hash(&FieldSubset::CrossSystem);
        let mut changed = current.clone();
        changed.update(&fields, &self.registry, now)?;
        self.most_recent = Some(changed.clone());

        let unique = changed.hash(&FieldSubset::Unique);
        let here = EntryRef::new(day.clone(), index);
        let made_duplicate = self.iter().any(|(at, entry)| {
            at != here && entry.hash(&FieldSubset::Unique) == unique
        });
        if made_duplicate {
            warn!("You made {}, {} a duplicate.", day, index);
        }

        match changed.day_key() {
            Some(new_day) if new_day != day => {
                info!("Changed day from {} to {}", day, new_day);
                let mut moved = changed.to_fields();
                moved.created = None;
                moved.modified = None;
                if !self.add(moved)? {
                    warn!("Could not move {}, {} to {}", day, index, new_day);
                    return Ok(false);
                }
                self.delete(&day, index);
            }
            _ => {
                let new_cross = changed.hash(&FieldSubset::CrossSystem);
                if let Some(slot) = self.events.get_mut(&day).and_then(|bucket| bucket.get_mut(index)) {
                    *slot = changed;
                }
                self.updated.insert(old_cross, new_cross);
                self.rebuild_straddle();
            }
        }
        Ok(true)
    }

    /// Remove the entry at `(day, index)`.
    pub fn delete(&mut self, day: &str, index: usize) -> bool {
        let Some(day) = resolve_day(day, Utc::now()) else {
            warn!("Invalid entry: {}, {}", day, index);
            return false;
        };
        let Some(bucket) = self.events.get_mut(&day).filter(|bucket| index < bucket.len()) else {
            warn!("Invalid entry: {}, {}", day, index);
            return false;
        };

        let entry = bucket.remove(index);
        if bucket.is_empty() {
            self.events.remove(&day);
        }
        self.removed.push(entry.hash(&FieldSubset::CrossSystem));
        self.rebuild_straddle();
        true
    }

    /// Delete the entry whose `subset` hash is `hash`.
    pub fn delete_by_hash(&mut self, hash: &str, subset: &FieldSubset) -> bool {
        match self.make_hash_keymap(subset).get(hash).cloned() {
            Some(at) => self.delete(&at.day, at.index),
            None => {
                warn!("Hash not found.");
                false
            }
        }
    }

    /// Update the entry whose `subset` hash is `hash`.
    pub fn update_by_hash(
        &mut self,
        hash: &str,
        subset: &FieldSubset,
        fields: EntryFields,
    ) -> CalendarResult<bool> {
        match self.make_hash_keymap(subset).get(hash).cloned() {
            Some(at) => self.update(&at.day, at.index, fields),
            None => {
                warn!("Hash not found.");
                Ok(false)
            }
        }
    }

    /// Check `candidate` against the bucket of its start day.
    ///
    /// Equal unique hashes are duplicates; otherwise closed-interval overlaps
    /// are conflicts. An index never lands in both lists.
    pub fn conflicts(&self, candidate: &Entry, is_new: bool) -> ConflictReport {
        let mut report = ConflictReport::default();
        let Some(day) = candidate.day_key() else {
            return report;
        };
        let Some(bucket) = self.events.get(&day) else {
            return report;
        };

        let hash = candidate.hash(&FieldSubset::Unique);
        for (i, stored) in bucket.iter().enumerate() {
            if stored.hash(&FieldSubset::Unique) == hash {
                if is_new {
                    warn!("Entry is duplicated with {}:{}", day, i);
                }
                report.duplicate.push(i);
            } else if candidate.overlaps(stored) {
                report.conflict.push(i);
            }
        }
        report
    }

    /// Rebuild the `hash -> (day, index)` map over the whole calendar.
    ///
    /// On a collision the later entry wins.
    pub fn make_hash_keymap(&mut self, subset: &FieldSubset) -> &HashMap<String, EntryRef> {
        let mut hashmap: HashMap<String, EntryRef> = HashMap::new();
        for (at, entry) in self.iter() {
            let hash = entry.hash(subset);
            if let Some(previous) = hashmap.get(&hash) {
                warn!(
                    "This entry ({}) has same hash as ({}) and will overwrite.",
                    at, previous
                );
            }
            hashmap.insert(hash, at);
        }
        self.hashmap = hashmap;
        &self.hashmap
    }

    /// Entries shown on `day`: carried-over straddles first (as `-1, -2,
    /// ...`) then the day's own bucket, ordered by `(utc_start, utc_stop)`.
    pub fn sort_day(&self, day: &str) -> SortedDay<'_> {
        let Some(day) = resolve_day(day, Utc::now()) else {
            warn!("Unreadable day '{}'", day);
            return SortedDay {
                day: day.to_string(),
                entries: Vec::new(),
            };
        };

        let carried = self
            .straddle
            .get(&day)
            .into_iter()
            .flatten()
            .zip(1..)
            .filter_map(|(at, n): (&EntryRef, i64)| {
                self.entry(&at.day, at.index).map(|entry| SortedEntry {
                    display_index: -n,
                    location: at.clone(),
                    entry,
                })
            });
        let own = self.events.get(&day).into_iter().flatten().enumerate().map(|(i, entry)| {
            SortedEntry {
                display_index: i as i64,
                location: EntryRef::new(day.clone(), i),
                entry,
            }
        });

        let mut entries: Vec<SortedEntry<'_>> = carried.chain(own).collect();
        entries.sort_by_key(|sorted| (sorted.entry.utc_start, sorted.entry.utc_stop));
        SortedDay { day, entries }
    }

    /// Rows for `day`: the display index followed by the `subset` values.
    pub fn list_day(&self, day: &str, subset: &FieldSubset) -> Vec<Vec<String>> {
        self.sort_day(day)
            .entries
            .iter()
            .map(|sorted| {
                std::iter::once(sorted.display_index.to_string())
                    .chain(sorted.entry.row(subset))
                    .collect()
            })
            .collect()
    }

    /// [`Calendar::list_day`] as a text table.
    pub fn format_day(&self, day: &str, subset: &FieldSubset) -> String {
        let headers: Vec<&str> = std::iter::once("#")
            .chain(subset.fields().iter().map(|field| field.name()))
            .collect();
        tabulate(&headers, &self.list_day(day, subset))
    }

    /// Timeline of `day` using the configured timezone and cell width.
    pub fn graph_day(&self, day: &str, header: EntryField) -> CalendarResult<String> {
        self.graph_day_with(day, header, &self.timezone, self.graph_interval_min)
    }

    /// Timeline of `day`; each row is labelled with its `header` value.
    pub fn graph_day_with(
        &self,
        day: &str,
        header: EntryField,
        timezone: &str,
        interval_min: f64,
    ) -> CalendarResult<String> {
        let now = Utc::now();
        let Some(date) = resolve_date(day, now) else {
            warn!("Unreadable day '{}'", day);
            return Ok(String::new());
        };
        let sorted = self.sort_day(&day_key(day_start(date)));

        let mut graph = TimelineGraph::setup(date, interval_min, 1.0);
        let headers = sorted
            .entries
            .iter()
            .map(|s| RowHeader::new(s.display_index, s.entry.printable(header)))
            .collect();
        graph.ticks_labels(timezone, &self.location, headers, now)?;
        if sorted.is_empty() {
            graph.empty_row();
        }
        for s in &sorted.entries {
            graph.row(s.entry.utc_start, s.entry.utc_stop);
        }
        Ok(graph.render())
    }

    /// Schedule a fixed sky position on a day.
    ///
    /// The target is sampled every ten minutes; the observation is the part
    /// above the elevation limit, trimmed to the requested duration around
    /// the highest point. `program` defaults to the source label and the
    /// label is appended to `note`.
    pub fn schedule(&mut self, request: &ScheduleRequest, mut fields: EntryFields) -> CalendarResult<bool> {
        let now = Utc::now();
        let ra = request.ra.as_deref().and_then(decode_ra);
        let dec = request.dec.as_deref().and_then(decode_dec);
        let (Some(ra), Some(dec)) = (ra, dec) else {
            error!("Sources not available.");
            return Ok(false);
        };
        let Some(day) = resolve_date(&request.day, now) else {
            warn!("Unreadable day '{}'", request.day);
            return Ok(false);
        };
        let location = match &fields.location {
            None | Some(Value::Null) => self.location.clone(),
            Some(value) => self.registry.resolve_value(value)?,
        };
        let label = request
            .source
            .clone()
            .unwrap_or_else(|| format!("{},{:.0}d", encode_lst(Some(ra)), dec.value()));

        let track = altitude_track(
            Target::new(ra, dec),
            &location,
            day,
            Duration::minutes(SCHEDULE_SAMPLE_MINUTES),
        );
        let desired = Duration::seconds((request.duration_hours * 3600.0).round() as i64);
        let Some(window) = select_window(track, Degrees::new(request.elevation_limit_deg), desired)
        else {
            warn!(
                "{} never above the elevation limit of {}.",
                label, request.elevation_limit_deg
            );
            return Ok(false);
        };

        let visible_hours = window.visible_duration().num_minutes() as f64 / 60.0;
        info!("Scheduling {}", label);
        if window.visible_duration() > desired {
            info!(
                "Scheduling middle {:.1}h of {:.1}h above {}d",
                request.duration_hours, visible_hours, request.elevation_limit_deg
            );
        } else {
            info!(
                "Scheduling {:.1}h above {}d of desired {:.1}h",
                visible_hours, request.elevation_limit_deg, request.duration_hours
            );
        }

        fields.utc_start = Some(isoformat(window.start));
        fields.utc_stop = Some(isoformat(window.stop));
        if fields.program.is_none() {
            fields.program = Some(label.clone());
        }
        fields.note = Some(match fields.note.take() {
            Some(note) => format!("{note} -- {label}"),
            None => label,
        });

        let added = self.add(fields)?;
        if added {
            info!("Now should edit down the scheduled observation times!");
        }
        Ok(added)
    }

    /// Add every field dictionary of a JSON array file.
    ///
    /// Returns `(added, rejected)`.
    pub fn add_from_file<P: AsRef<Path>>(&mut self, path: P) -> CalendarResult<(usize, usize)> {
        let text = fs::read_to_string(path.as_ref())?;
        let rows: Vec<EntryFields> = serde_json::from_str(&text)?;

        let (mut added, mut rejected) = (0, 0);
        for fields in rows {
            match self.add(fields) {
                Ok(true) => added += 1,
                Ok(false) => rejected += 1,
                Err(e) => {
                    error!("{}", e);
                    rejected += 1;
                }
            }
        }
        info!("Added {} and rejected {}", added, rejected);
        Ok((added, rejected))
    }

    /// Every stored entry with its coordinate, in day then bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryRef, &Entry)> {
        self.events.iter().flat_map(|(day, bucket)| {
            bucket
                .iter()
                .enumerate()
                .map(move |(index, entry)| (EntryRef::new(day.clone(), index), entry))
        })
    }

    pub fn entry(&self, day: &str, index: usize) -> Option<&Entry> {
        self.events.get(day).and_then(|bucket| bucket.get(index))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn events(&self) -> &BTreeMap<String, Vec<Entry>> {
        &self.events
    }

    /// End day to entries that started on an earlier day, latest start first.
    pub fn straddle(&self) -> &BTreeMap<String, Vec<EntryRef>> {
        &self.straddle
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn added(&self) -> &[String] {
        &self.added
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub fn updated(&self) -> &BTreeMap<String, String> {
        &self.updated
    }

    /// Forget the audit lists, e.g. once an external store has caught up.
    pub fn clear_audit(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.updated.clear();
    }

    /// Map built by the last [`Calendar::make_hash_keymap`] call.
    pub fn hashmap(&self) -> &HashMap<String, EntryRef> {
        &self.hashmap
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn calfile(&self) -> Option<&Path> {
        self.calfile.as_deref()
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Entry built by the last add or update, accepted or not.
    pub fn most_recent(&self) -> Option<&Entry> {
        self.most_recent.as_ref()
    }

    /// Conflict check of the last add.
    pub fn last_results(&self) -> &ConflictReport {
        &self.results
    }

    fn rebuild_straddle(&mut self) {
        let mut straddle: BTreeMap<String, Vec<(Option<DateTime<Utc>>, EntryRef)>> = BTreeMap::new();
        for (at, entry) in self.iter() {
            if !entry.straddles() {
                continue;
            }
            if let Some(stop) = entry.utc_stop {
                straddle
                    .entry(day_key(stop))
                    .or_default()
                    .push((entry.utc_start, at));
            }
        }
        self.straddle = straddle
            .into_iter()
            .map(|(day, mut refs)| {
                refs.sort_by(|a, b| b.0.cmp(&a.0));
                (day, refs.into_iter().map(|(_, at)| at).collect())
            })
            .collect();
    }
}

/// Open the year snapshot for the entry's start, add it and write the file.
///
/// Returns `""` when the entry was not added (or is invalid), `"ok"` when it
/// went in cleanly, or the comma-separated indices it overlaps.
pub fn add_entry_to_file(config: &CalendarConfig, fields: EntryFields) -> CalendarResult<String> {
    let Some(start) = fields.utc_start.clone() else {
        error!("utc_start not included.");
        return Ok(String::new());
    };
    let mut calendar = Calendar::open(&start, config, true)?;
    let added = calendar.add(fields)?;

    let accepted = added && calendar.most_recent().is_some_and(|entry| entry.valid);
    if !accepted {
        let reason = calendar.most_recent().map(|e| e.msg.as_str()).unwrap_or_default();
        error!("Entry add was unsuccessful.\n{}", reason);
        return Ok(String::new());
    }
    if let Some(entry) = calendar.most_recent() {
        info!("{}", entry);
    }
    calendar.write()?;

    let conflicts = &calendar.last_results().conflict;
    if conflicts.is_empty() {
        Ok("ok".to_string())
    } else {
        let msg = join_indices(conflicts);
        warn!("Entry conflicts with {}", msg);
        Ok(msg)
    }
}

/// Bucket key for a day expression.
fn resolve_day(expr: &str, now: DateTime<Utc>) -> Option<String> {
    resolve_date(expr, now).map(|date| day_key(day_start(date)))
}

fn resolve_date(expr: &str, now: DateTime<Utc>) -> Option<NaiveDate> {
    parse_day_key(expr.trim()).or_else(|| interpret_date(expr, now).map(|t| t.date_naive()))
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn plural_entries(indices: &[usize]) -> String {
    let suffix = if indices.len() == 1 { "y" } else { "ies" };
    let list = indices
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("entr{suffix}: {list}")
}
