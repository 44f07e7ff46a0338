#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use obscal::db::config::{CONFIG_ENV, LOCATION_ENV, PATH_ENV, TIMEZONE_ENV};
use obscal::{CalendarConfig, EntryFields};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Values for the four `OBSCAL_*` variables read by
/// [`CalendarConfig::from_env`]. `None` leaves a variable unset.
#[derive(Debug, Default)]
pub struct CalendarEnv<'a> {
    pub path: Option<&'a str>,
    pub location: Option<&'a str>,
    pub timezone: Option<&'a str>,
    pub config: Option<&'a str>,
}

impl CalendarEnv<'_> {
    fn pairs(&self) -> [(&'static str, Option<&str>); 4] {
        [
            (PATH_ENV, self.path),
            (LOCATION_ENV, self.location),
            (TIMEZONE_ENV, self.timezone),
            (CONFIG_ENV, self.config),
        ]
    }
}

/// Build a configuration from exactly the variables in `env`.
///
/// Any `OBSCAL_*` values already in the process are put back afterwards,
/// and concurrent callers take turns.
pub fn config_from_env(env: &CalendarEnv<'_>) -> CalendarConfig {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _restore = SavedCalendarEnv::apply(env);
    CalendarConfig::from_env().unwrap()
}

struct SavedCalendarEnv {
    saved: Vec<(&'static str, Option<String>)>,
}

impl SavedCalendarEnv {
    fn apply(env: &CalendarEnv<'_>) -> Self {
        let mut saved = Vec::new();
        for (name, value) in env.pairs() {
            saved.push((name, std::env::var(name).ok()));
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
        Self { saved }
    }
}

impl Drop for SavedCalendarEnv {
    fn drop(&mut self) {
        for (name, value) in self.saved.drain(..) {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Configuration writing snapshots into `dir`, with a UTC civil axis.
pub fn config_in(dir: &Path) -> CalendarConfig {
    CalendarConfig {
        path: dir.to_path_buf(),
        timezone: "UTC".to_string(),
        ..CalendarConfig::default()
    }
}

pub fn observation(program: &str, start: &str, stop: &str) -> EntryFields {
    EntryFields::new()
        .with("program", program)
        .with("utc_start", start)
        .with("utc_stop", stop)
}
