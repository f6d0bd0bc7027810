use std::time::Duration;

use url::Url;

use crate::args::{OutputFormat, ProbeArgs};
use crate::error::HttpError;
use crate::probe::ProbeSettings;

/// Fully validated settings of one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub probe: ProbeSettings,
    pub clients: usize,
    pub slow_start: bool,
    pub report_interval: Duration,
    pub queue_capacity: usize,
    pub output_format: OutputFormat,
    pub output: Option<String>,
}

impl RunSettings {
    /// # Errors
    ///
    /// Returns an error when the target URL is malformed, uses a scheme other
    /// than http/https, or has no host.
    pub fn from_args(args: &ProbeArgs) -> Result<Self, HttpError> {
        let url = parse_target_url(&args.url)?;
        Ok(Self {
            probe: ProbeSettings {
                url,
                interval: Duration::from_millis(args.interval_ms.get()),
                lifetime: Duration::from_secs(args.lifetime_secs.get()),
                disable_compression: args.disable_compression,
                timeout: args.request_timeout,
            },
            clients: args.clients.get(),
            slow_start: args.slow_start,
            report_interval: args.report_interval,
            queue_capacity: args.queue_capacity.get(),
            output_format: args.output_format,
            output: args.output.clone(),
        })
    }

    /// Delay between starting two consecutive probes.
    ///
    /// `interval / clients` in whole milliseconds, plus `lifetime / clients`
    /// in whole seconds with slow start.
    #[must_use]
    pub fn stagger(&self) -> Duration {
        let clients = u64::try_from(self.clients).unwrap_or(u64::MAX).max(1);
        let interval_ms = u64::try_from(self.probe.interval.as_millis()).unwrap_or(u64::MAX);
        let mut delay = Duration::from_millis(interval_ms.checked_div(clients).unwrap_or(0));
        if self.slow_start {
            let lifetime_secs = self.probe.lifetime.as_secs();
            delay = delay.saturating_add(Duration::from_secs(
                lifetime_secs.checked_div(clients).unwrap_or(0),
            ));
        }
        delay
    }
}

pub(crate) fn parse_target_url(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw).map_err(|source| HttpError::InvalidUrl {
        url: raw.to_owned(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HttpError::UnsupportedScheme {
                url: raw.to_owned(),
                scheme: other.to_owned(),
            });
        }
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(HttpError::UrlMissingHost {
            url: raw.to_owned(),
        });
    }
    Ok(url)
}
