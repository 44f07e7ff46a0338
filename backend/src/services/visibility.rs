//! Visibility-window scheduling.
//!
//! Samples a fixed sky position's altitude over one UTC day for an observing
//! site and turns the samples into a concrete observation window. The same
//! machinery converts a Local Sidereal Time into a UTC instant by finding the
//! transit of a synthetic target whose right ascension equals that LST.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use qtty::{Degree, Degrees, HourAngles};

use crate::models::location::Location;
use crate::models::time::{day_start, local_sidereal_time};

/// Sampling cadence used when scheduling a source.
pub const SCHEDULE_SAMPLE_MINUTES: i64 = 10;

/// Sampling cadence used when resolving an LST to UTC.
pub const LST_SAMPLE_MINUTES: i64 = 1;

/// Default minimum altitude for a target to count as observable.
pub const DEFAULT_ELEVATION_LIMIT_DEG: f64 = 15.0;

/// Default requested observation length.
pub const DEFAULT_DURATION_HOURS: f64 = 12.0;

/// Declination of the synthetic LST target, relative to the site latitude.
const LST_TARGET_DEC_OFFSET_DEG: f64 = -10.0;

/// A fixed sky position (J2000, precession ignored).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub ra: HourAngles,
    pub dec: Degrees,
}

impl Target {
    pub fn new(ra: HourAngles, dec: Degrees) -> Self {
        Self { ra, dec }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeSample {
    pub time: DateTime<Utc>,
    pub altitude: Degrees,
}

/// Altitude of `target` above the horizon at `location` and instant `t`.
pub fn altitude(target: &Target, location: &Location, t: DateTime<Utc>) -> Degrees {
    let lst = local_sidereal_time(t, location.longitude);
    let hour_angle = (lst - target.ra).to::<Degree>();
    let lat = location.latitude;
    let sin_alt = target.dec.sin() * lat.sin() + target.dec.cos() * lat.cos() * hour_angle.cos();
    Degrees::new(sin_alt.clamp(-1.0, 1.0).asin().to_degrees())
}

/// Lazy, finite sequence of altitude samples across one UTC day.
#[derive(Debug, Clone)]
pub struct AltitudeTrack<'a> {
    target: Target,
    location: &'a Location,
    next: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl Iterator for AltitudeTrack<'_> {
    type Item = AltitudeSample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let time = self.next;
        self.next = time + self.step;
        Some(AltitudeSample {
            time,
            altitude: altitude(&self.target, self.location, time),
        })
    }
}

/// Sample `target` every `sample_interval` from 00:00 UTC of `day` up to
/// (not including) the following midnight.
pub fn altitude_track(
    target: Target,
    location: &Location,
    day: NaiveDate,
    sample_interval: Duration,
) -> AltitudeTrack<'_> {
    let start = day_start(day);
    AltitudeTrack {
        target,
        location,
        next: start,
        end: start + Duration::days(1),
        step: sample_interval.max(Duration::seconds(1)),
    }
}

/// Instant of maximum altitude during `day`, at one-minute resolution.
pub fn transit_time(target: Target, location: &Location, day: NaiveDate) -> DateTime<Utc> {
    altitude_track(target, location, day, Duration::minutes(LST_SAMPLE_MINUTES))
        .max_by(|a, b| a.altitude.value().total_cmp(&b.altitude.value()))
        .map(|sample| sample.time)
        .unwrap_or_else(|| day_start(day))
}

/// UTC instant during `day` at which the local sidereal time equals `lst`.
///
/// Found as the transit of a target at RA = `lst`, placed ten degrees south
/// of the zenith so the altitude curve has a well-defined peak.
pub fn utc_from_lst(lst: HourAngles, location: &Location, day: NaiveDate) -> DateTime<Utc> {
    let target = Target::new(
        lst,
        location.latitude + Degrees::new(LST_TARGET_DEC_OFFSET_DEG),
    );
    transit_time(target, location, day)
}

/// An observation window chosen from an altitude track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationWindow {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    /// Highest sample inside the visible span
    pub peak: AltitudeSample,
    pub visible_start: DateTime<Utc>,
    pub visible_stop: DateTime<Utc>,
}

impl ObservationWindow {
    pub fn duration(&self) -> Duration {
        self.stop - self.start
    }

    pub fn visible_duration(&self) -> Duration {
        self.visible_stop - self.visible_start
    }
}

/// Choose an observation window from `track`.
///
/// Samples strictly above `elevation_limit` form the visible span (first to
/// last such sample). When the span is longer than `desired`, a window of
/// exactly `desired` is centred on the peak sample; otherwise the whole span
/// is returned. `None` when no sample clears the limit.
pub fn select_window<I>(
    track: I,
    elevation_limit: Degrees,
    desired: Duration,
) -> Option<ObservationWindow>
where
    I: IntoIterator<Item = AltitudeSample>,
{
    let mut visible = track
        .into_iter()
        .filter(|sample| sample.altitude.value() > elevation_limit.value());

    let first = visible.next()?;
    let (last, peak) = visible.fold((first, first), |(_, peak), sample| {
        let peak = if sample.altitude.value() > peak.altitude.value() {
            sample
        } else {
            peak
        };
        (sample, peak)
    });

    let (visible_start, visible_stop) = (first.time, last.time);
    let (start, stop) = if visible_stop - visible_start > desired {
        let start = peak.time - desired / 2;
        (start, start + desired)
    } else {
        (visible_start, visible_stop)
    };

    Some(ObservationWindow {
        start,
        stop,
        peak,
        visible_start,
        visible_stop,
    })
}
