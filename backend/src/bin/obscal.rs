//! Calendar viewer.
//!
//! Prints the entry listing and the timeline of one day.
//!
//! # Usage
//!
//! ```bash
//! obscal              # today
//! obscal 2025-06-01
//! obscal tomorrow
//! ```
//!
//! # Environment Variables
//!
//! - `OBSCAL_PATH`: directory holding the `aocal<YEAR>.json` snapshots
//! - `OBSCAL_LOCATION`: default site (default: ata)
//! - `OBSCAL_TZ`: timezone of the civil axis (default: system)
//! - `OBSCAL_CONFIG`: TOML file with the settings above
//! - `RUST_LOG`: Log level (default: info)

use std::env;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use obscal::{Calendar, CalendarConfig, EntryField, FieldSubset};

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let day = env::args().nth(1).unwrap_or_else(|| "today".to_string());
    let config = CalendarConfig::from_env()?;
    let calendar = Calendar::open(&day, &config, false)?;
    if let Some(path) = calendar.calfile() {
        info!("Calendar file {}", path.display());
    }

    println!("{}", calendar.format_day(&day, &FieldSubset::Short));
    println!();
    println!("{}", calendar.graph_day(&day, EntryField::Program)?);
    Ok(())
}
