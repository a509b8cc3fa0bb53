//! Cache configuration.
//!
//! Controls the entry directory, TTL, and optional background sweep via
//! `gearcache.toml`.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DIRECTORY: &str = "cache";
const DEFAULT_TTL_HOURS: u64 = 24;

/// Cache configuration resolved from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Root directory holding one file per cached key.
    pub directory: PathBuf,
    /// Time-to-live applied to every entry.
    pub ttl: Duration,
    /// Interval of the optional expired-entry sweep; `None` keeps expiry lazy only.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            ttl: Duration::from_secs(DEFAULT_TTL_HOURS * 60 * 60),
            sweep_interval: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            directory: settings.directory.clone(),
            ttl: settings.ttl,
            sweep_interval: settings.sweep_interval,
        }
    }
}
