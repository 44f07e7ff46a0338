//! Printable encodings for entry field values.
//!
//! Each field type gets a pure `encode_*`/`decode_*` pair so the in-memory
//! value and its snapshot/display text never get mixed up.

use chrono::{DateTime, Utc};
use qtty::{Degrees, HourAngles};

use super::time::{interpret_date, isoformat};

/// Instant as ISO-8601 seconds, empty when unset.
pub fn encode_instant(value: Option<DateTime<Utc>>) -> String {
    value.map(isoformat).unwrap_or_default()
}

/// Instant from any accepted date expression.
pub fn decode_instant(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    interpret_date(text, now)
}

/// Sidereal time as `HHhMMmSSs`, empty when unset.
pub fn encode_lst(value: Option<HourAngles>) -> String {
    let Some(lst) = value else {
        return String::new();
    };
    let total = (lst.value() * 3600.0).round().rem_euclid(86_400.0) as u32;
    format!(
        "{:02}h{:02}m{:02}s",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Sidereal time from `HHhMMmSSs`, `HH:MM:SS` or decimal hours.
pub fn decode_lst(text: &str) -> Option<HourAngles> {
    let hours = parse_sexagesimal(text)?;
    if !(0.0..=24.0).contains(&hours) {
        return None;
    }
    Some(HourAngles::new(hours))
}

/// Recurrence list joined with commas.
pub fn encode_recurring(values: &[String]) -> String {
    values.join(",")
}

pub fn decode_recurring(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a sexagesimal or decimal number.
///
/// Components may be separated by `:`, whitespace or the unit letters
/// `h`/`d`/`m`/`s` (so `12h30m00s`, `-10d30m`, `12:30:00` and `12.5` all
/// work). A leading sign applies to the whole value.
pub fn parse_sexagesimal(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<f64>() {
        return value.is_finite().then_some(value);
    }

    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };

    let parts: Vec<f64> = body
        .split(|c: char| c == ':' || c.is_whitespace() || "hdms°'\"".contains(c))
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()?;

    if parts.is_empty() || parts.len() > 3 || parts.iter().skip(1).any(|p| *p >= 60.0 || *p < 0.0) {
        return None;
    }

    let value = parts
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(part, scale)| part / scale)
        .sum::<f64>();
    Some(sign * value)
}

/// Right ascension in hours.
pub fn decode_ra(text: &str) -> Option<HourAngles> {
    parse_sexagesimal(text)
        .filter(|hours| (0.0..24.0).contains(hours))
        .map(HourAngles::new)
}

/// Declination in degrees.
pub fn decode_dec(text: &str) -> Option<Degrees> {
    parse_sexagesimal(text)
        .filter(|degrees| (-90.0..=90.0).contains(degrees))
        .map(Degrees::new)
}

/// Render rows as a plain-text table with a dashed rule under the headers.
pub fn tabulate(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(table_line(headers.iter().copied(), &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(table_line(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}
