use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveU64, PositiveUsize, ProbeArgs};
use crate::error::ConfigError;

use super::types::ConfigFile;

/// Applies configuration values to CLI arguments. Values given on the command
/// line take precedence over the file.
///
/// # Errors
///
/// Returns an error when a config value is out of range or malformed.
pub fn apply_config(
    args: &mut ProbeArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> Result<(), ConfigError> {
    if !is_cli(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = url;
    }

    if !is_cli(matches, "interval_ms")
        && let Some(interval) = config.interval_ms
    {
        args.interval_ms = ensure_positive_u64(interval, "interval_ms")?;
    }

    if !is_cli(matches, "lifetime_secs")
        && let Some(lifetime) = config.lifetime_secs
    {
        args.lifetime_secs = ensure_positive_u64(lifetime, "lifetime_secs")?;
    }

    if !is_cli(matches, "clients")
        && let Some(clients) = config.clients
    {
        args.clients = ensure_positive_usize(clients, "clients")?;
    }

    if !is_cli(matches, "slow_start")
        && let Some(slow_start) = config.slow_start
    {
        args.slow_start = slow_start;
    }

    if !is_cli(matches, "disable_compression")
        && let Some(disable) = config.disable_compression
    {
        args.disable_compression = disable;
    }

    if !is_cli(matches, "report_interval")
        && let Some(interval) = config.report_interval.as_ref()
    {
        args.report_interval =
            interval
                .to_duration()
                .map_err(|source| ConfigError::InvalidDuration {
                    field: "report_interval",
                    source,
                })?;
    }

    if !is_cli(matches, "queue_capacity")
        && let Some(capacity) = config.queue_capacity
    {
        args.queue_capacity = ensure_positive_usize(capacity, "queue_capacity")?;
    }

    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        let timeout = timeout
            .to_duration()
            .map_err(|source| ConfigError::InvalidDuration {
                field: "timeout",
                source,
            })?;
        args.request_timeout = Some(timeout);
    }

    if !is_cli(matches, "output_format")
        && let Some(format) = config.output_format
    {
        args.output_format = format;
    }

    if !is_cli(matches, "output")
        && let Some(output) = config.output.clone()
    {
        args.output = Some(output);
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &'static str) -> Result<PositiveU64, ConfigError> {
    PositiveU64::try_from(value)
        .map_err(|source| ConfigError::FieldMustBePositive { field, source })
}

fn ensure_positive_usize(value: usize, field: &'static str) -> Result<PositiveUsize, ConfigError> {
    PositiveUsize::try_from(value)
        .map_err(|source| ConfigError::FieldMustBePositive { field, source })
}
