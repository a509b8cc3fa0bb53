use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the gearcache binary.
#[derive(Debug, Parser)]
#[command(
    name = "gearcache",
    version,
    about = "Caching gear list service for TBC class/spec/phase data"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "GEARCACHE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Fetch one class/spec (one phase or all) and print it as JSON.
    Fetch(FetchArgs),
    /// Fill the cache for every key in the catalog.
    Warm(WarmArgs),
    /// Inspect or clear the cache directory.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// Overrides shared by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the cache directory.
    #[arg(long = "cache-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,

    /// Override the cache entry time-to-live in hours.
    #[arg(long = "cache-ttl-hours", value_name = "HOURS")]
    pub cache_ttl_hours: Option<u64>,

    /// Override the producer mode (fallback|upstream).
    #[arg(long = "producer-mode", value_name = "MODE")]
    pub producer_mode: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "producer-timeout-ms", value_name = "MILLIS")]
    pub producer_timeout_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Class identifier, e.g. `mage`.
    pub class: String,

    /// Spec identifier, e.g. `frost`.
    pub spec: String,

    /// Single phase to fetch; all configured phases when omitted.
    #[arg(long = "phase", value_name = "PHASE")]
    pub phase: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WarmArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// List cached keys, expired ones included.
    Keys,
    /// Delete every cache entry.
    Clear,
}
