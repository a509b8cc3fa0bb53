//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::{Catalog, PhaseRange};

mod cli;

pub use cli::{
    CacheArgs, CacheCommand, CliArgs, Command, CommonOverrides, FetchArgs, ServeArgs,
    ServeOverrides, WarmArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "gearcache";
const ENV_PREFIX: &str = "GEARCACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_DIR: &str = "./cache";
const DEFAULT_CACHE_TTL_HOURS: u64 = 24;
const DEFAULT_PRODUCER_BASE_URL: &str = "https://wowsims.github.io/tbc/";
const DEFAULT_PRODUCER_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_FANOUT_CONCURRENCY: usize = 3;
const DEFAULT_WARM_DELAY_MS: u64 = 500;
const DEFAULT_EXPORTER_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const DEFAULT_EXPORTER_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PHASE_MIN: u32 = 1;
const DEFAULT_PHASE_MAX: u32 = 6;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub producer: ProducerSettings,
    pub fetch: FetchSettings,
    pub exporter: ExporterSettings,
    pub catalog: Catalog,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub ttl: Duration,
    pub sweep_interval: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerMode {
    /// Deterministic placeholder data only.
    Fallback,
    /// Scrape the upstream pages, falling back on fault.
    Upstream,
}

impl FromStr for ProducerMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(Self::Fallback),
            "upstream" => Ok(Self::Upstream),
            other => Err(format!(
                "unknown producer mode `{other}` (expected fallback or upstream)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub mode: ProducerMode,
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub fanout_concurrency: usize,
    pub single_flight: bool,
    pub warm_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ExporterSettings {
    /// Bearer token for the Sheets API; export is disabled without one.
    pub access_token: Option<String>,
    pub api_base: Url,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Fetch(args)) => raw.apply_common_overrides(&args.overrides),
        Some(Command::Warm(args)) => raw.apply_common_overrides(&args.overrides),
        Some(Command::Cache(args)) => raw.apply_common_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    producer: RawProducerSettings,
    fetch: RawFetchSettings,
    exporter: RawExporterSettings,
    catalog: RawCatalogSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }

        self.apply_common_overrides(&overrides.common);
    }

    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(directory) = overrides.cache_dir.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(hours) = overrides.cache_ttl_hours {
            self.cache.ttl_hours = Some(hours);
        }
        if let Some(mode) = overrides.producer_mode.as_ref() {
            self.producer.mode = Some(mode.clone());
        }
        if let Some(timeout) = overrides.producer_timeout_ms {
            self.producer.timeout_ms = Some(timeout);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            producer,
            fetch,
            exporter,
            catalog,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let producer = build_producer_settings(producer)?;
        let fetch = build_fetch_settings(fetch)?;
        let exporter = build_exporter_settings(exporter)?;
        let catalog = build_catalog(catalog)?;

        Ok(Self {
            server,
            logging,
            cache,
            producer,
            fetch,
            exporter,
            catalog,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let directory = cache
        .directory
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

    let ttl_hours = cache.ttl_hours.unwrap_or(DEFAULT_CACHE_TTL_HOURS);
    if ttl_hours == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_hours",
            "must be greater than zero",
        ));
    }
    let ttl_secs = ttl_hours
        .checked_mul(60 * 60)
        .ok_or_else(|| LoadError::invalid("cache.ttl_hours", "value is too large"))?;

    let sweep_interval = match cache.sweep_interval_seconds {
        None => None,
        Some(0) => {
            return Err(LoadError::invalid(
                "cache.sweep_interval_seconds",
                "must be greater than zero when set",
            ));
        }
        Some(seconds) => Some(Duration::from_secs(seconds)),
    };

    Ok(CacheSettings {
        directory,
        ttl: Duration::from_secs(ttl_secs),
        sweep_interval,
    })
}

fn build_producer_settings(producer: RawProducerSettings) -> Result<ProducerSettings, LoadError> {
    let mode = match producer.mode {
        Some(mode) => {
            ProducerMode::from_str(&mode).map_err(|reason| LoadError::invalid("producer.mode", reason))?
        }
        None => ProducerMode::Fallback,
    };

    let base_url = parse_base_url(
        "producer.base_url",
        producer.base_url.as_deref().unwrap_or(DEFAULT_PRODUCER_BASE_URL),
    )?;

    let timeout_ms = producer.timeout_ms.unwrap_or(DEFAULT_PRODUCER_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "producer.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(ProducerSettings {
        mode,
        base_url,
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_fetch_settings(fetch: RawFetchSettings) -> Result<FetchSettings, LoadError> {
    let fanout_concurrency = fetch
        .fanout_concurrency
        .unwrap_or(DEFAULT_FANOUT_CONCURRENCY);
    if fanout_concurrency == 0 {
        return Err(LoadError::invalid(
            "fetch.fanout_concurrency",
            "must be greater than zero",
        ));
    }

    Ok(FetchSettings {
        fanout_concurrency,
        single_flight: fetch.single_flight.unwrap_or(true),
        warm_delay: Duration::from_millis(fetch.warm_delay_ms.unwrap_or(DEFAULT_WARM_DELAY_MS)),
    })
}

fn build_exporter_settings(exporter: RawExporterSettings) -> Result<ExporterSettings, LoadError> {
    let access_token = exporter.access_token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let api_base = parse_base_url(
        "exporter.api_base",
        exporter.api_base.as_deref().unwrap_or(DEFAULT_EXPORTER_API_BASE),
    )?;

    let timeout_ms = exporter.timeout_ms.unwrap_or(DEFAULT_EXPORTER_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "exporter.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(ExporterSettings {
        access_token,
        api_base,
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_catalog(catalog: RawCatalogSettings) -> Result<Catalog, LoadError> {
    let phase_min = catalog.phase_min.unwrap_or(DEFAULT_PHASE_MIN);
    let phase_max = catalog.phase_max.unwrap_or(DEFAULT_PHASE_MAX);
    let phases = PhaseRange::new(phase_min, phase_max)
        .map_err(|err| LoadError::invalid("catalog.phase_max", err.to_string()))?;

    let categories: Vec<(String, Vec<String>)> = match catalog.categories {
        Some(categories) => categories.into_iter().collect(),
        None => Catalog::reference()
            .as_map()
            .into_iter()
            .map(|(name, subs)| (name.to_string(), subs.to_vec()))
            .collect(),
    };

    Catalog::new(categories, phases)
        .map_err(|err| LoadError::invalid("catalog.categories", err.to_string()))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    directory: Option<PathBuf>,
    ttl_hours: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProducerSettings {
    mode: Option<String>,
    base_url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFetchSettings {
    fanout_concurrency: Option<usize>,
    single_flight: Option<bool>,
    warm_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawExporterSettings {
    access_token: Option<String>,
    api_base: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    categories: Option<BTreeMap<String, Vec<String>>>,
    phase_min: Option<u32>,
    phase_max: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Parse a base URL, forcing a trailing slash so relative joins append.
fn parse_base_url(key: &'static str, value: &str) -> Result<Url, LoadError> {
    let trimmed = value.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{trimmed}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    Ok(url)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
