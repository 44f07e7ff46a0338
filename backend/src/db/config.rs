//! Calendar configuration from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};

use super::error::{CalendarError, CalendarResult};
use crate::models::location::{SiteCoordinates, DEFAULT_SITE};
use crate::models::time::interpret_date;

/// Environment variable naming the snapshot directory.
pub const PATH_ENV: &str = "OBSCAL_PATH";
/// Environment variable naming the default site.
pub const LOCATION_ENV: &str = "OBSCAL_LOCATION";
/// Environment variable naming the display timezone.
pub const TIMEZONE_ENV: &str = "OBSCAL_TZ";
/// Environment variable naming a TOML file to start from.
pub const CONFIG_ENV: &str = "OBSCAL_CONFIG";

/// Calendar settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Directory holding the yearly snapshot files
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Snapshot files are named `<prefix><YEAR>.json`
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Site used for entries that do not name one
    #[serde(default = "default_location")]
    pub location: String,
    /// Civil timezone for the timeline (`sys`, IANA name or abbreviation)
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Timeline cell width in minutes
    #[serde(default = "default_graph_interval_min")]
    pub graph_interval_min: f64,
    /// Drop duplicate entries found while loading a snapshot
    #[serde(default = "default_skip_duplicates")]
    pub skip_duplicates: bool,
    /// Extra named sites
    #[serde(default)]
    pub sites: BTreeMap<String, SiteCoordinates>,
}

fn default_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_prefix() -> String {
    "aocal".to_string()
}

fn default_location() -> String {
    DEFAULT_SITE.to_string()
}

fn default_timezone() -> String {
    "sys".to_string()
}

fn default_graph_interval_min() -> f64 {
    10.0
}

fn default_skip_duplicates() -> bool {
    true
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            file_prefix: default_file_prefix(),
            location: default_location(),
            timezone: default_timezone(),
            graph_interval_min: default_graph_interval_min(),
            skip_duplicates: default_skip_duplicates(),
            sites: BTreeMap::new(),
        }
    }
}

impl CalendarConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(CalendarConfig)` if successful
    /// * `Err(CalendarError::Config)` if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> CalendarResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            CalendarError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| CalendarError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Build configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `OBSCAL_CONFIG` (optional): TOML file to start from
    /// - `OBSCAL_PATH` (optional, default: `.`): snapshot directory
    /// - `OBSCAL_LOCATION` (optional, default: `ata`): default site
    /// - `OBSCAL_TZ` (optional, default: `sys`): display timezone
    pub fn from_env() -> CalendarResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`CalendarConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> CalendarResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV).filter(|v| !v.trim().is_empty()) {
            Some(file) => Self::from_file(file)?,
            None => Self::default(),
        };

        if let Some(path) = lookup(PATH_ENV).filter(|v| !v.trim().is_empty()) {
            config.path = PathBuf::from(path);
        }
        if let Some(location) = lookup(LOCATION_ENV).filter(|v| !v.trim().is_empty()) {
            config.location = location;
        }
        if let Some(timezone) = lookup(TIMEZONE_ENV).filter(|v| !v.trim().is_empty()) {
            config.timezone = timezone;
        }
        Ok(config)
    }

    /// Snapshot file name for a year.
    pub fn file_name(&self, year: i32) -> String {
        format!("{}{}.json", self.file_prefix, year)
    }

    /// Resolve a calendar file designation to a path.
    ///
    /// A `*.json` name is used as given (joined to `path` when it has no
    /// directory part); anything else is read as a date expression and maps
    /// to that year's snapshot. `None` when the expression is unreadable.
    pub fn resolve_calfile(&self, designation: &str, now: DateTime<Utc>) -> Option<PathBuf> {
        let designation = designation.trim();
        if designation.ends_with(".json") {
            let file = PathBuf::from(designation);
            let has_dir = file
                .parent()
                .is_some_and(|parent| !parent.as_os_str().is_empty());
            return Some(if has_dir { file } else { self.path.join(file) });
        }
        let reference = interpret_date(designation, now)?;
        Some(self.path.join(self.file_name(reference.year())))
    }
}
