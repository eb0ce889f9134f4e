use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;
use time::macros::format_description;
use time::UtcOffset;

use crate::grouping::{DisplayZone, LocalZone};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {:?}, expected text or json", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, StructOpt)]
#[structopt(name = "galleria")]
pub struct Settings {
    /// Tracing directives, e.g. `info,galleria_sync=debug`.
    #[structopt(long, default_value = "info", env = "GALLERIA_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format, `text` or `json`.
    #[structopt(long, default_value = "text", env = "GALLERIA_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// How long a finished upload stays on screen, in milliseconds.
    #[structopt(
        long,
        default_value = "2000",
        env = "GALLERIA_PROGRESS_CLEAR_DELAY_MS"
    )]
    pub progress_clear_delay_ms: u64,

    /// Zone used to bucket photos by day, e.g. `-05:00`. Defaults to the system zone.
    #[structopt(long, parse(try_from_str = parse_utc_offset), env = "GALLERIA_DISPLAY_UTC_OFFSET")]
    pub display_utc_offset: Option<UtcOffset>,

    /// Whether the listing after sign-in may be answered from the local catalog.
    #[structopt(
        long,
        default_value = "true",
        parse(try_from_str),
        env = "GALLERIA_INITIAL_FETCH_USES_CACHE"
    )]
    pub initial_fetch_uses_cache: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            progress_clear_delay_ms: 2000,
            display_utc_offset: None,
            initial_fetch_uses_cache: true,
        }
    }
}

impl Settings {
    /// Reads settings from the environment only, ignoring process arguments.
    pub fn from_env() -> Result<Self, structopt::clap::Error> {
        Settings::from_iter_safe(std::iter::once("galleria"))
    }

    pub fn progress_clear_delay(&self) -> Duration {
        Duration::from_millis(self.progress_clear_delay_ms)
    }

    /// The configured offset if there is one, otherwise the system zone.
    pub fn display_zone(&self) -> Arc<dyn DisplayZone> {
        match self.display_utc_offset {
            Some(offset) => Arc::new(offset),
            None => Arc::new(LocalZone),
        }
    }
}

pub fn parse_utc_offset(s: &str) -> Result<UtcOffset, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(s, format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
        .map_err(|err| format!("invalid UTC offset {:?}: {}", s, err))
}
