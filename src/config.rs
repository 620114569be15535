//! Process configuration, read from flags or the environment.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::refresh::check::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Raw command-line / environment settings.
///
/// Malformed numbers are rejected by clap before `Config` is built.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to serve /metrics on; a bare ":port" listens on all interfaces
    #[arg(long, env = "LISTEN_ADDR", default_value = ":2112")]
    pub listen_addr: String,

    /// Seconds between full refreshes
    #[arg(long, env = "REFRESH_PERIOD", default_value_t = 300)]
    pub refresh_period: u64,

    /// Number of checks fetched concurrently
    #[arg(long, env = "CONCURRENCY", default_value_t = 10)]
    pub concurrency: usize,

    /// Deadline in seconds for a single advisory API call
    #[arg(long, env = "CALL_TIMEOUT")]
    pub call_timeout: Option<u64>,

    /// Skip a scheduled refresh while the previous one is still running
    #[arg(
        long,
        env = "SKIP_OVERLAPPING",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = false
    )]
    pub skip_overlapping: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Validated settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub refresh_period: Duration,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub skip_overlapping: bool,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if args.refresh_period == 0 {
            return Err(ConfigError::ZeroRefreshPeriod);
        }

        Ok(Self {
            listen_addr: parse_listen_addr(&args.listen_addr)?,
            refresh_period: Duration::from_secs(args.refresh_period),
            concurrency: args.concurrency.max(1),
            retry: RetryPolicy {
                call_timeout: args.call_timeout.map(Duration::from_secs),
                ..RetryPolicy::default()
            },
            skip_overlapping: args.skip_overlapping,
            log_format: args.log_format,
        })
    }
}

/// Parse a listen address, accepting the host-less ":port" form.
pub fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let trimmed = raw.trim();
    let full = match trimmed.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => trimmed.to_string(),
    };
    full.parse().map_err(|source| ConfigError::ListenAddr {
        addr: raw.to_string(),
        source,
    })
}
