//! Application configuration, read from the environment.
//!
//! Durations accept either integer seconds (`60`) or a human string (`15m`, `500ms`).

use anyhow::Context;
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for the crate's own targets; everything else stays at `warn`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Port for the web server.
    #[serde(default = "default_port")]
    pub port: u16,
    pub database_url: String,
    /// Grace period for services to stop after a shutdown signal.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,

    pub congress_api_key: String,
    #[serde(default = "default_congress_base_url")]
    pub congress_base_url: String,
    #[serde(default = "default_congress_requests_per_hour")]
    pub congress_requests_per_hour: u32,
    #[serde(
        default = "default_congress_cooldown",
        deserialize_with = "deserialize_duration"
    )]
    pub congress_cooldown: Duration,

    /// Without a key, summaries are skipped and everything else still runs.
    #[serde(default)]
    pub summarizer_api_key: Option<String>,
    #[serde(default = "default_summarizer_base_url")]
    pub summarizer_base_url: String,
    #[serde(default = "default_summarizer_model")]
    pub summarizer_model: String,
    #[serde(default = "default_summarizer_rpm")]
    pub summarizer_rpm: u32,
    #[serde(
        default = "default_summarizer_cooldown",
        deserialize_with = "deserialize_duration"
    )]
    pub summarizer_cooldown: Duration,

    #[serde(default = "default_member_workers")]
    pub member_workers: usize,
    #[serde(default = "default_bill_workers")]
    pub bill_workers: usize,
    /// How far back the first bills run looks when no cursor is stored.
    #[serde(
        default = "default_bills_lookback",
        deserialize_with = "deserialize_duration"
    )]
    pub bills_lookback: Duration,
}

impl Config {
    /// Loads configuration from raw environment variable names.
    pub fn load() -> anyhow::Result<Self> {
        Figment::new()
            .merge(Env::raw())
            .extract()
            .context("Failed to load config")
    }

    /// Summarizer key, ignoring blank values.
    pub fn summarizer_key(&self) -> Option<&str> {
        self.summarizer_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_congress_base_url() -> String {
    "https://api.congress.gov/v3/".to_string()
}

/// Congress.gov grants 5,000 requests per hour per key.
fn default_congress_requests_per_hour() -> u32 {
    5000
}

fn default_congress_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_summarizer_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/".to_string()
}

fn default_summarizer_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_summarizer_rpm() -> u32 {
    15
}

fn default_summarizer_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_member_workers() -> usize {
    10
}

fn default_bill_workers() -> usize {
    4
}

fn default_bills_lookback() -> Duration {
    Duration::from_secs(15 * 60)
}

const DURATION_UNITS: &[TimeUnit] = &[
    TimeUnit::MilliSecond,
    TimeUnit::Second,
    TimeUnit::Minute,
    TimeUnit::Hour,
    TimeUnit::Day,
];

fn parse_duration(raw: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_time_units(DURATION_UNITS)
        .parse(raw.trim())
        .map_err(|e| format!("invalid duration '{raw}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{raw}': {e}"))
}

/// Accepts integer seconds or a duration string.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration in seconds or a string like \"15m\"")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            parse_duration(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
