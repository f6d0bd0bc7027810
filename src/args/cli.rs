use clap::Parser;
use std::time::Duration;

use super::parsers::{parse_duration_arg, parse_positive_u64, parse_positive_usize};
use super::types::{OutputFormat, PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Synthetic HTTP probe - issues periodic GET requests from simulated clients, infers TCP session lifecycles, and reports rolling latency/status statistics."
)]
pub struct ProbeArgs {
    /// Disable response compression (no Accept-Encoding is sent)
    #[arg(long = "disable-compression", short = 'c')]
    pub disable_compression: bool,

    /// Client interval between requests (milliseconds)
    #[arg(
        long = "interval",
        short = 'i',
        default_value = "1000",
        value_parser = parse_positive_u64
    )]
    pub interval_ms: PositiveU64,

    /// Session lifetime (seconds); idle connections are dropped when it elapses
    #[arg(
        long = "lifetime",
        short = 'l',
        default_value = "300",
        value_parser = parse_positive_u64
    )]
    pub lifetime_secs: PositiveU64,

    /// Number of simulated clients
    #[arg(
        long = "clients",
        short = 'n',
        default_value = "1",
        value_parser = parse_positive_usize
    )]
    pub clients: PositiveUsize,

    /// Slow start: stagger clients over the session lifetime as well as the interval
    #[arg(long = "slow-start", short = 's')]
    pub slow_start: bool,

    /// URL to fetch
    #[arg(long, short, default_value = "https://localhost/")]
    pub url: String,

    /// Reporting window for request statistics (supports ms/s/m/h)
    #[arg(
        long = "report-interval",
        default_value = "1s",
        value_parser = parse_duration_arg
    )]
    pub report_interval: Duration,

    /// Capacity of the event queue between clients and the reporter
    #[arg(
        long = "queue-capacity",
        default_value = "100",
        value_parser = parse_positive_usize
    )]
    pub queue_capacity: PositiveUsize,

    /// Per-request timeout (supports ms/s/m/h); unset waits indefinitely
    #[arg(long = "timeout", value_parser = parse_duration_arg)]
    pub request_timeout: Option<Duration>,

    /// Report line format
    #[arg(long = "output-format", default_value = "text", ignore_case = true)]
    pub output_format: OutputFormat,

    /// Append report lines to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<String>,

    /// Path to a TOML/JSON config file (defaults to ./polltrace.toml or ./polltrace.json)
    #[arg(long)]
    pub config: Option<String>,

    /// Enable verbose logging (sets log level to debug unless overridden by POLLTRACE_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}
