//! Observing sites.
//!
//! A [`Location`] is a named geodetic coordinate. Entries store it as
//! `lat=<deg>,lon=<deg>,height=<m>[,name=<label>]`; callers may also refer to
//! a site by name, resolved through the [`SiteRegistry`].

use std::collections::BTreeMap;
use std::fmt;

use qtty::{Degrees, Meters};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::error::LocationError;

/// Name of the built-in default site.
pub const DEFAULT_SITE: &str = "ata";

/// Allen Telescope Array, Hat Creek Radio Observatory.
const ATA: SiteCoordinates = SiteCoordinates {
    lat: 40.817_431,
    lon: -121.470_736,
    height: 1019.0,
};

/// Geodetic position of an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: Option<String>,
    pub latitude: Degrees,
    /// East positive
    pub longitude: Degrees,
    pub height: Meters,
}

impl Location {
    pub fn new(name: Option<&str>, lat: f64, lon: f64, height: f64) -> Self {
        Self {
            name: name.map(str::to_string),
            latitude: Degrees::new(lat),
            longitude: Degrees::new(lon),
            height: Meters::new(height),
        }
    }

    /// Snapshot encoding.
    pub fn encode(&self) -> String {
        let mut text = format!(
            "lat={},lon={},height={}",
            self.latitude.value(),
            self.longitude.value(),
            self.height.value()
        );
        if let Some(name) = &self.name {
            text.push_str(",name=");
            text.push_str(name);
        }
        text
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Coordinates of a named site, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteCoordinates {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub height: f64,
}

/// Named sites that entries and the calendar can refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRegistry {
    sites: BTreeMap<String, SiteCoordinates>,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        let mut sites = BTreeMap::new();
        sites.insert(DEFAULT_SITE.to_string(), ATA);
        Self { sites }
    }
}

impl SiteRegistry {
    /// Built-in sites plus `extra` (which may override them).
    pub fn with_sites(extra: &BTreeMap<String, SiteCoordinates>) -> Self {
        let mut registry = Self::default();
        for (name, coordinates) in extra {
            registry.insert(name, *coordinates);
        }
        registry
    }

    pub fn insert(&mut self, name: &str, coordinates: SiteCoordinates) {
        self.sites.insert(name.to_ascii_lowercase(), coordinates);
    }

    pub fn get(&self, name: &str) -> Option<Location> {
        let key = name.trim().to_ascii_lowercase();
        self.sites
            .get(&key)
            .map(|site| Location::new(Some(&key), site.lat, site.lon, site.height))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    /// Resolve a site name or a `lat=..,lon=..` string.
    pub fn resolve(&self, text: &str) -> Result<Location, LocationError> {
        let text = text.trim();
        if text.contains('=') {
            return parse_pairs(text);
        }
        self.get(text)
            .ok_or_else(|| LocationError::UnknownSite(text.to_string()))
    }

    /// Resolve a snapshot value: a string, or a legacy JSON object.
    pub fn resolve_value(&self, value: &Value) -> Result<Location, LocationError> {
        match value {
            Value::String(text) => self.resolve(text),
            Value::Object(map) => {
                let number = |keys: &[&str]| {
                    keys.iter()
                        .filter_map(|key| map.get(*key))
                        .find_map(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
                };
                let malformed = |reason: &str| LocationError::Malformed {
                    input: value.to_string(),
                    reason: reason.to_string(),
                };
                let lat = number(&["lat", "latitude"]).ok_or_else(|| malformed("missing lat"))?;
                let lon = number(&["lon", "longitude"]).ok_or_else(|| malformed("missing lon"))?;
                let height = number(&["height", "elevation"]).unwrap_or(0.0);
                let name = map.get("name").and_then(Value::as_str);
                Ok(Location::new(name, lat, lon, height))
            }
            other => Err(LocationError::Malformed {
                input: other.to_string(),
                reason: "expected a string or an object".to_string(),
            }),
        }
    }
}

fn parse_pairs(text: &str) -> Result<Location, LocationError> {
    let malformed = |reason: String| LocationError::Malformed {
        input: text.to_string(),
        reason,
    };

    let mut lat = None;
    let mut lon = None;
    let mut height = 0.0;
    let mut name = None;

    for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| malformed(format!("'{pair}' is not key=value")))?;
        let value = value.trim();
        let number = || {
            value
                .parse::<f64>()
                .map_err(|_| malformed(format!("'{value}' is not a number")))
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "lat" | "latitude" => lat = Some(number()?),
            "lon" | "longitude" => lon = Some(number()?),
            "height" | "elevation" => height = number()?,
            "name" => name = Some(value),
            other => return Err(malformed(format!("unknown key '{other}'"))),
        }
    }

    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Location::new(name, lat, lon, height)),
        _ => Err(malformed("lat and lon are required".to_string())),
    }
}
