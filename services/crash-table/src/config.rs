use clap::Parser;
use crash_execution::RoundTiming;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

use crate::round::DEFAULT_START_BALANCE;

const ENV_PREFIX: &str = "CRASH_TABLE_";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9140;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 15_000;

/// Command line for the crash table service.
///
/// Every flag left unset falls back to `CRASH_TABLE_<FLAG>` in the environment, then to
/// the built-in default.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Args {
    /// Host interface to bind (default: 127.0.0.1).
    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding the ledger snapshot and log.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Tick period in milliseconds.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    #[arg(long)]
    pub countdown_ms: Option<u64>,

    /// Pause between a crash and the next countdown.
    #[arg(long)]
    pub crash_hold_ms: Option<u64>,

    /// How often the ledger is compacted into a snapshot.
    #[arg(long)]
    pub snapshot_interval_ms: Option<u64>,

    /// Balance granted to a player on first reference in a channel.
    #[arg(long)]
    pub start_balance: Option<u64>,

    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} is invalid: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("invalid round timing: {0}")]
    InvalidTiming(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub host: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub timing: RoundTiming,
    pub snapshot_interval: Duration,
    pub start_balance: u64,
    pub log_level: Level,
}

pub fn build_config(args: &Args) -> Result<EngineConfig, ConfigError> {
    build_config_with(args, |key| std::env::var(key).ok())
}

/// Resolve `args` against an environment lookup.
pub fn build_config_with(
    args: &Args,
    env: impl Fn(&str) -> Option<String>,
) -> Result<EngineConfig, ConfigError> {
    let lookup = Lookup { env };
    let defaults = RoundTiming::default();

    let host = lookup.resolve("host", args.host.clone(), DEFAULT_HOST.to_string())?;
    let host = host.parse::<IpAddr>().map_err(|_| ConfigError::InvalidValue {
        field: "host",
        value: host,
    })?;
    let timing = RoundTiming {
        tick_ms: non_zero("tick_ms", lookup.resolve("tick_ms", args.tick_ms, defaults.tick_ms)?)?,
        countdown_ms: non_zero(
            "countdown_ms",
            lookup.resolve("countdown_ms", args.countdown_ms, defaults.countdown_ms)?,
        )?,
        crash_hold_ms: non_zero(
            "crash_hold_ms",
            lookup.resolve("crash_hold_ms", args.crash_hold_ms, defaults.crash_hold_ms)?,
        )?,
    };
    timing.validate().map_err(ConfigError::InvalidTiming)?;
    let snapshot_interval_ms = non_zero(
        "snapshot_interval_ms",
        lookup.resolve(
            "snapshot_interval_ms",
            args.snapshot_interval_ms,
            DEFAULT_SNAPSHOT_INTERVAL_MS,
        )?,
    )?;
    let start_balance = non_zero(
        "start_balance",
        lookup.resolve("start_balance", args.start_balance, DEFAULT_START_BALANCE)?,
    )?;
    let log_level = lookup.resolve("log_level", args.log_level.clone(), "info".to_string())?;
    let log_level = Level::from_str(&log_level)
        .map_err(|_| ConfigError::InvalidLogLevel { value: log_level })?;

    Ok(EngineConfig {
        host,
        port: lookup.resolve("port", args.port, DEFAULT_PORT)?,
        data_dir: lookup.resolve("data_dir", args.data_dir.clone(), PathBuf::from(DEFAULT_DATA_DIR))?,
        timing,
        snapshot_interval: Duration::from_millis(snapshot_interval_ms),
        start_balance,
        log_level,
    })
}

struct Lookup<F> {
    env: F,
}

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    /// Flag value, else `CRASH_TABLE_<FIELD>`, else `fallback`.
    fn resolve<T: FromStr>(
        &self,
        field: &'static str,
        flag: Option<T>,
        fallback: T,
    ) -> Result<T, ConfigError> {
        if let Some(value) = flag {
            return Ok(value);
        }
        let key = format!("{ENV_PREFIX}{}", field.to_ascii_uppercase());
        match (self.env)(&key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { field, value: raw }),
            _ => Ok(fallback),
        }
    }
}

fn non_zero(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(value)
}
