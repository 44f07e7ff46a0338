//! Text timeline of a day's observations.
//!
//! A [`TimelineGraph`] divides a span (normally one UTC day) into `N` equal
//! cells and lays three clocks over it: UTC and a civil timezone as label
//! rows above a shared tick row, and Local Sidereal Time as tick/label rows
//! underneath. Each entry is painted as a row of cells between them.
//!
//! ```text
//!              0     2     4     6  ...
//!        PDT  5     7     9    11   ...
//!             |  :  |  :  |  :  |   ...
//!   0 survey  ......*******.......  ...
//!             |     |    |     |    ...
//!        LST    1     3     5       ...
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::db::error::TimeError;
use crate::models::location::Location;
use crate::models::time::{civil_zone, day_start, local_sidereal_time, DAY_SECONDS, SIDEREAL_RATE};

/// Hours between labelled marks on every axis.
const LABEL_STEP_HOURS: f64 = 2.0;

const UTC_TICK: char = '|';
const CIVIL_TICK: char = ':';
const LST_TICK: char = '|';
const CURRENT_TICK: char = '0';
const EMPTY_CELL: char = '.';
const FILLED_CELL: char = '*';
const CURRENT_EMPTY: char = '|';
const CURRENT_FILLED: char = 'X';

/// Display index and label printed in front of an entry row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowHeader {
    pub index: i64,
    pub label: String,
}

impl RowHeader {
    pub fn new(index: i64, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimelineGraph {
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    cells: usize,
    cell_seconds: f64,
    zone_name: String,
    utc_labels: Vec<char>,
    civil_labels: Vec<char>,
    ticks: Vec<char>,
    lst_ticks: Vec<char>,
    lst_labels: Vec<char>,
    current: Option<usize>,
    headers: Vec<RowHeader>,
    rows: Vec<Vec<char>>,
}

impl TimelineGraph {
    /// Grid starting at UTC midnight of `day`, `duration_days` long, with
    /// cells of (about) `interval_min` minutes.
    pub fn setup(day: NaiveDate, interval_min: f64, duration_days: f64) -> Self {
        let start = day_start(day);
        let span_seconds = (duration_days.max(0.0) * DAY_SECONDS).round();
        let stop = start + Duration::seconds(span_seconds as i64);
        let cells = if interval_min > 0.0 {
            (span_seconds / (interval_min * 60.0)).round().max(1.0) as usize
        } else {
            1
        };
        let blank = vec![' '; cells + 1];

        Self {
            start,
            stop,
            cells,
            cell_seconds: span_seconds.max(1.0) / cells as f64,
            zone_name: String::new(),
            utc_labels: blank.clone(),
            civil_labels: blank.clone(),
            ticks: blank.clone(),
            lst_ticks: blank.clone(),
            lst_labels: blank,
            current: None,
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Number of cells across the grid.
    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }

    /// Fractional cell position of `t` (may fall outside `0..=N`).
    fn position(&self, t: DateTime<Utc>) -> f64 {
        (t - self.start).num_milliseconds() as f64 / 1000.0 / self.cell_seconds
    }

    fn span_hours(&self) -> f64 {
        self.cells as f64 * self.cell_seconds / 3600.0
    }

    /// Compute the axis labels and tick marks, and record the row headers.
    ///
    /// `timezone` is resolved at the grid start; `now` is marked on the tick
    /// row when it falls inside the grid.
    pub fn ticks_labels(
        &mut self,
        timezone: &str,
        location: &Location,
        row_headers: Vec<RowHeader>,
        now: DateTime<Utc>,
    ) -> Result<(), TimeError> {
        let zone = civil_zone(timezone, self.start)?;
        self.zone_name = zone.name.clone();

        let span_hours = self.span_hours();

        // UTC: the grid starts on a UTC midnight.
        for elapsed in marks(0.0, span_hours) {
            let x = self.cell_index(elapsed);
            // The closing midnight of a one-day grid reads 24.
            let hour = match elapsed.round() as i64 {
                24 => 24,
                other => other.rem_euclid(24),
            };
            place_label(&mut self.utc_labels, x, hour);
            self.ticks[x] = UTC_TICK;
        }

        // Civil: first even local hour at or after the grid start.
        let local_start = zone.offset_hours().rem_euclid(24.0);
        for elapsed in marks(local_start, span_hours) {
            let x = self.cell_index(elapsed);
            place_label(&mut self.civil_labels, x, clock_hour(local_start + elapsed));
            if self.ticks[x] == ' ' {
                self.ticks[x] = CIVIL_TICK;
            }
        }

        // Sidereal: marks are spaced in sidereal hours, which run fast.
        let lst_start = local_sidereal_time(self.start, location.longitude).value();
        for sidereal_elapsed in marks(lst_start, span_hours * SIDEREAL_RATE) {
            let x = self.cell_index(sidereal_elapsed / SIDEREAL_RATE);
            place_label(&mut self.lst_labels, x, clock_hour(lst_start + sidereal_elapsed));
            self.lst_ticks[x] = LST_TICK;
        }

        self.current = None;
        if now >= self.start && now < self.stop {
            let x = (self.position(now).floor() as usize).min(self.cells - 1);
            self.ticks[x] = CURRENT_TICK;
            self.current = Some(x);
        }

        self.headers = row_headers;
        self.rows.clear();
        Ok(())
    }

    fn cell_index(&self, elapsed_hours: f64) -> usize {
        let x = (elapsed_hours * 3600.0 / self.cell_seconds).round();
        (x.max(0.0) as usize).min(self.cells)
    }

    /// Paint one entry. Starts before the grid clip to cell 0, stops after
    /// it clip to cell N; a missing bound leaves the row empty.
    pub fn row(&mut self, start: Option<DateTime<Utc>>, stop: Option<DateTime<Utc>>) {
        let mut cells = vec![EMPTY_CELL; self.cells];
        if let (Some(start), Some(stop)) = (start, stop) {
            let first = if start < self.start {
                0
            } else {
                self.position(start).floor() as usize
            };
            let last = self.position(stop).floor() + 1.0;
            let last = if last <= 0.0 {
                0
            } else {
                (last as usize).min(self.cells)
            };
            for cell in cells.iter_mut().take(last).skip(first) {
                *cell = FILLED_CELL;
            }
        }
        if let Some(x) = self.current {
            cells[x] = if cells[x] == FILLED_CELL {
                CURRENT_FILLED
            } else {
                CURRENT_EMPTY
            };
        }
        self.rows.push(cells);
    }

    /// An unpainted row, used when the day has no entries.
    pub fn empty_row(&mut self) {
        self.row(None, None);
    }

    /// Assemble all rows into a fixed-width text block.
    pub fn render(&self) -> String {
        let index_width = self
            .headers
            .iter()
            .map(|h| h.index.to_string().len())
            .max()
            .unwrap_or(1);
        let label_width = self
            .headers
            .iter()
            .map(|h| h.label.chars().count())
            .max()
            .unwrap_or(0)
            .max(self.zone_name.chars().count())
            .max(3);
        let prefix_width = index_width + label_width + 2;
        let axis = |name: &str, line: &[char]| {
            let text: String = line.iter().collect();
            format!("{name:>prefix_width$} {}", text.trim_end())
        };

        let mut lines = vec![
            axis("UTC", &self.utc_labels),
            axis(&self.zone_name, &self.civil_labels),
            axis("", &self.ticks),
        ];
        for (i, cells) in self.rows.iter().enumerate() {
            let row: String = cells.iter().collect();
            let prefix = match self.headers.get(i) {
                Some(header) => format!(
                    "{:>index_width$} {:<label_width$}",
                    header.index, header.label
                ),
                None => " ".repeat(prefix_width - 1),
            };
            lines.push(format!("{prefix}  {row}"));
        }
        lines.push(axis("", &self.lst_ticks));
        lines.push(axis("LST", &self.lst_labels));
        lines.join("\n")
    }
}

/// Elapsed hours (from the grid start) of every even-hour mark on a clock
/// reading `clock_start` at the grid start, up to `span` hours.
fn marks(clock_start: f64, span: f64) -> Vec<f64> {
    let first = (LABEL_STEP_HOURS - clock_start.rem_euclid(LABEL_STEP_HOURS)) % LABEL_STEP_HOURS;
    let mut marks = Vec::new();
    let mut elapsed = first;
    while elapsed <= span + 1e-9 {
        marks.push(elapsed);
        elapsed += LABEL_STEP_HOURS;
    }
    marks
}

/// Hour of day shown for a clock reading.
fn clock_hour(clock_hours: f64) -> i64 {
    (clock_hours.round() as i64).rem_euclid(24)
}

/// Write `hour` at `x`: last digit at `x`, tens digit at `x - 1`.
fn place_label(line: &mut [char], x: usize, hour: i64) {
    if hour > 9 && x >= 1 {
        line[x - 1] = char::from(b'0' + (hour / 10 % 10) as u8);
    }
    if x < line.len() {
        line[x] = char::from(b'0' + (hour % 10) as u8);
    }
}
