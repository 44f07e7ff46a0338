//! Time handling for the observation calendar.
//!
//! Interprets the loose date expressions users type ("now", "+2h",
//! "2025-06-01T10:00", "2025/3d"), computes Local Sidereal Time for a site
//! and resolves civil timezone designations to a UTC offset.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::{Tz, TZ_VARIANTS};
use qtty::{Degrees, HourAngle, HourAngles};

use crate::db::error::TimeError;

/// Seconds in a mean solar day.
pub const DAY_SECONDS: f64 = 86_400.0;

/// Sidereal seconds elapsed per solar second.
pub const SIDEREAL_RATE: f64 = 1.002_737_909_35;

/// Julian Date of the Unix epoch.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Julian Date of the J2000.0 epoch.
pub const J2000_JD: f64 = 2_451_545.0;

/// Storage format for instants (ISO-8601 to the second).
pub const ISO_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

/// Years an interpreted instant may fall in.
pub const CALENDAR_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Naive formats accepted for absolute instants, tried in order.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Interpret a date expression relative to `now`.
///
/// Accepted forms:
/// - keywords `now`, `current`, `today`, `yesterday`, `tomorrow`
/// - `YYYY`, `YYYY-MM`, `YYYY-MM-DD` (start of the year, month or day)
/// - ISO-8601 with `T` or a space, optional fraction and UTC offset
/// - `<expr>/<n><unit>`, `<keyword>+<n><unit>` or bare `+<n><unit>`
///
/// Offset units are `d`, `h`, `m`, `s`; a bare number means minutes.
/// Returns `None` for anything that cannot be read, and for instants outside
/// [`CALENDAR_YEARS`].
pub fn interpret_date(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    interpret(expr, now).filter(|t| CALENDAR_YEARS.contains(&t.year()))
}

fn interpret(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let expr = expr.trim();
    if expr.is_empty() || expr.eq_ignore_ascii_case("none") {
        return None;
    }

    if let Some((base, offset)) = expr.split_once('/') {
        return interpret_date(base, now)?.checked_add_signed(parse_offset(offset)?);
    }

    if expr.starts_with('+') || expr.starts_with('-') {
        return now.checked_add_signed(parse_offset(expr)?);
    }

    let lower = expr.to_ascii_lowercase();
    if let Some(pos) = lower.find(|c: char| c == '+' || c == '-') {
        let (word, offset) = lower.split_at(pos);
        if word.chars().all(|c| c.is_ascii_alphabetic()) {
            return keyword_instant(word, now)?.checked_add_signed(parse_offset(offset)?);
        }
    }

    keyword_instant(&lower, now).or_else(|| parse_absolute(expr))
}

fn keyword_instant(word: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match word {
        "now" | "current" | "today" => Some(now),
        "yesterday" => now.checked_sub_signed(Duration::days(1)),
        "tomorrow" => now.checked_add_signed(Duration::days(1)),
        _ => None,
    }
}

/// Parse a signed offset such as `+2h`, `-30`, `1.5d` or `90s`.
pub fn parse_offset(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };

    let last = body.chars().last()?;
    let (number, unit_seconds) = match last.to_ascii_lowercase() {
        'd' => (&body[..body.len() - 1], DAY_SECONDS),
        'h' => (&body[..body.len() - 1], 3600.0),
        'm' => (&body[..body.len() - 1], 60.0),
        's' => (&body[..body.len() - 1], 1.0),
        _ => (body, 60.0),
    };

    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let millis = (sign * value * unit_seconds * 1000.0).round();
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    match text.len() {
        4 => {
            let year: i32 = text.parse().ok()?;
            return NaiveDate::from_ymd_opt(year, 1, 1).map(day_start);
        }
        7 => {
            return NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d")
                .ok()
                .map(day_start);
        }
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(day_start(date));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z")
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// UTC midnight at the start of `date`.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

/// UTC midnight at the start of the day containing `t`.
pub fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    day_start(t.date_naive())
}

/// Day key (`YYYY-MM-DD`, UTC) of an instant.
pub fn day_key(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d").to_string()
}

/// Parse a day key back into a date.
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d")
        .ok()
        .filter(|date| CALENDAR_YEARS.contains(&date.year()))
}

/// ISO-8601 text truncated to whole seconds.
pub fn isoformat(t: DateTime<Utc>) -> String {
    t.format(ISO_SECONDS).to_string()
}

/// Julian Date of a UTC instant.
pub fn julian_date(t: DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9;
    seconds / DAY_SECONDS + UNIX_EPOCH_JD
}

/// Local Sidereal Time at `longitude` (east positive) for a UTC instant.
///
/// Uses the IAU 1982 expression for Greenwich Mean Sidereal Time, which is
/// good to well under a second over the calendar's time span.
pub fn local_sidereal_time(t: DateTime<Utc>, longitude: Degrees) -> HourAngles {
    let d = julian_date(t) - J2000_JD;
    let c = d / 36_525.0;
    let gmst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * c * c
        - c * c * c / 38_710_000.0;
    (Degrees::new(gmst) + longitude).wrap_pos().to::<HourAngle>()
}

/// A civil timezone resolved at a particular instant.
#[derive(Debug, Clone, PartialEq)]
pub struct CivilZone {
    /// Abbreviation in effect (e.g. `PDT`)
    pub name: String,
    /// Local time minus UTC
    pub offset: Duration,
}

impl CivilZone {
    pub fn offset_hours(&self) -> f64 {
        self.offset.num_seconds() as f64 / 3600.0
    }

    /// Convert a UTC instant to wall-clock time in this zone.
    pub fn local(&self, t: DateTime<Utc>) -> NaiveDateTime {
        t.naive_utc() + self.offset
    }
}

/// Resolve a timezone designation at instant `at`.
///
/// `sys` uses the host zone. IANA names (`America/Los_Angeles`) resolve
/// directly; abbreviations (`PST`, `PDT`) are matched against the zone
/// database. Anything else is an error.
pub fn civil_zone(designation: &str, at: DateTime<Utc>) -> Result<CivilZone, TimeError> {
    let name = designation.trim();
    if matches!(
        name.to_ascii_lowercase().as_str(),
        "sys" | "system" | "local"
    ) {
        return Ok(system_zone(at));
    }

    if let Ok(zone) = name.parse::<Tz>() {
        return Ok(zone_at(zone, at));
    }

    let abbreviation = name.to_ascii_uppercase();
    // Daylight abbreviations exist for half the year only; winter wins ties.
    let references = [
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single(),
        Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).single(),
        Some(at),
    ];
    for reference in references.into_iter().flatten() {
        for zone in TZ_VARIANTS.iter() {
            let offset = zone.offset_from_utc_datetime(&reference.naive_utc());
            if offset.to_string() == abbreviation {
                return Ok(CivilZone {
                    name: abbreviation,
                    offset: Duration::seconds(i64::from(offset.fix().local_minus_utc())),
                });
            }
        }
    }

    Err(TimeError::UnknownTimezone(name.to_string()))
}

fn zone_at(zone: Tz, at: DateTime<Utc>) -> CivilZone {
    let offset = zone.offset_from_utc_datetime(&at.naive_utc());
    CivilZone {
        name: offset.to_string(),
        offset: Duration::seconds(i64::from(offset.fix().local_minus_utc())),
    }
}

fn system_zone(at: DateTime<Utc>) -> CivilZone {
    if let Some(zone) = iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse::<Tz>().ok())
    {
        return zone_at(zone, at);
    }
    let offset = chrono::Local.offset_from_utc_datetime(&at.naive_utc());
    CivilZone {
        name: "local".to_string(),
        offset: Duration::seconds(i64::from(offset.local_minus_utc())),
    }
}
