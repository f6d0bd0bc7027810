use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::MetricsError;
use crate::probe::{RequestRecord, average_duration};

use super::histogram::LatencyHistogram;
use super::millis;

/// Latency figures over the successful requests of a window, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub avg_ms: u64,
    pub fastest_ms: u64,
    pub slowest_ms: u64,
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p99_ms: u64,
}

/// Body sizes over the successful requests of a window, in bytes on the wire.
///
/// Compressed responses are counted at their encoded size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeStats {
    pub avg_bytes: u64,
    pub min_bytes: u64,
    pub max_bytes: u64,
    pub total_bytes: u64,
}

/// One flushed reporting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSummary {
    pub timestamp: String,
    pub requests: u64,
    pub errors: u64,
    pub reused: u64,
    pub compressed: u64,
    /// Absent when every request of the window failed.
    pub latency: Option<LatencyStats>,
    /// Bytes on the wire; see [`SizeStats`].
    pub size: Option<SizeStats>,
    pub status_codes: BTreeMap<u16, u64>,
    pub dns_started: u64,
    pub dns_succeeded: u64,
    pub tls_started: u64,
    pub tls_succeeded: u64,
}

impl fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests:{} errors:{} reused:{} compressed:{}",
            self.timestamp, self.requests, self.errors, self.reused, self.compressed
        )?;
        if let Some(latency) = &self.latency {
            write!(
                f,
                " avg:{}ms fastest:{}ms slowest:{}ms p50:{}ms p90:{}ms p99:{}ms",
                latency.avg_ms,
                latency.fastest_ms,
                latency.slowest_ms,
                latency.p50_ms,
                latency.p90_ms,
                latency.p99_ms
            )?;
        }
        if let Some(size) = &self.size {
            write!(
                f,
                " wire_size(avg:{}B min:{}B max:{}B total:{}B)",
                size.avg_bytes, size.min_bytes, size.max_bytes, size.total_bytes
            )?;
        }
        if !self.status_codes.is_empty() {
            let codes: Vec<String> = self
                .status_codes
                .iter()
                .map(|(code, count)| format!("{}:{}", code, count))
                .collect();
            write!(f, " status:{{{}}}", codes.join(","))?;
        }
        if self.dns_started > 0 || self.dns_succeeded > 0 {
            write!(f, " dns:{}/{}", self.dns_started, self.dns_succeeded)?;
        }
        if self.tls_started > 0 || self.tls_succeeded > 0 {
            write!(f, " tls:{}/{}", self.tls_started, self.tls_succeeded)?;
        }
        Ok(())
    }
}

/// Request statistics accumulated between two flushes.
///
/// Counters for errors, reuse, compression, DNS and TLS count every request.
/// Latency, size and status figures only count successful requests.
#[derive(Debug)]
pub struct RollingSummary {
    requests: u64,
    errors: u64,
    reused: u64,
    compressed: u64,
    dns_started: u64,
    dns_succeeded: u64,
    tls_started: u64,
    tls_succeeded: u64,
    successes: u64,
    total_duration: Duration,
    fastest: Option<Duration>,
    slowest: Option<Duration>,
    histogram: LatencyHistogram,
    total_bytes: u64,
    min_bytes: Option<u64>,
    max_bytes: Option<u64>,
    status_codes: BTreeMap<u16, u64>,
}

impl RollingSummary {
    /// # Errors
    ///
    /// Returns an error if the latency histogram cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            requests: 0,
            errors: 0,
            reused: 0,
            compressed: 0,
            dns_started: 0,
            dns_succeeded: 0,
            tls_started: 0,
            tls_succeeded: 0,
            successes: 0,
            total_duration: Duration::ZERO,
            fastest: None,
            slowest: None,
            histogram: LatencyHistogram::new()?,
            total_bytes: 0,
            min_bytes: None,
            max_bytes: None,
            status_codes: BTreeMap::new(),
        })
    }

    #[must_use]
    pub const fn requests(&self) -> u64 {
        self.requests
    }

    /// Add one request to the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the latency cannot be recorded in the histogram;
    /// every other figure has been updated by then.
    pub fn record(&mut self, request: &RequestRecord) -> Result<(), MetricsError> {
        self.requests = self.requests.saturating_add(1);
        bump(&mut self.reused, request.reused_connection);
        bump(&mut self.compressed, request.used_compression);
        bump(&mut self.dns_started, request.dns_started);
        bump(&mut self.dns_succeeded, request.dns_succeeded);
        bump(&mut self.tls_started, request.tls_started);
        bump(&mut self.tls_succeeded, request.tls_succeeded);

        if request.failed {
            self.errors = self.errors.saturating_add(1);
            return Ok(());
        }

        self.successes = self.successes.saturating_add(1);
        self.total_duration = self.total_duration.saturating_add(request.duration);
        self.fastest = Some(
            self.fastest
                .map_or(request.duration, |fastest| fastest.min(request.duration)),
        );
        self.slowest = Some(
            self.slowest
                .map_or(request.duration, |slowest| slowest.max(request.duration)),
        );
        self.total_bytes = self.total_bytes.saturating_add(request.content_length);
        self.min_bytes = Some(
            self.min_bytes
                .map_or(request.content_length, |min| min.min(request.content_length)),
        );
        self.max_bytes = Some(
            self.max_bytes
                .map_or(request.content_length, |max| max.max(request.content_length)),
        );
        if let Some(code) = request.status_code {
            let count = self.status_codes.entry(code).or_insert(0);
            *count = count.saturating_add(1);
        }
        self.histogram.record(request.duration)
    }

    /// Summarise the window and start a new one.
    ///
    /// Returns `None`, leaving the window untouched, when it saw no requests.
    pub fn take(&mut self, timestamp: String) -> Option<WindowSummary> {
        if self.requests == 0 {
            return None;
        }
        let summary = WindowSummary {
            timestamp,
            requests: self.requests,
            errors: self.errors,
            reused: self.reused,
            compressed: self.compressed,
            latency: self.latency_stats(),
            size: self.size_stats(),
            status_codes: std::mem::take(&mut self.status_codes),
            dns_started: self.dns_started,
            dns_succeeded: self.dns_succeeded,
            tls_started: self.tls_started,
            tls_succeeded: self.tls_succeeded,
        };
        self.reset();
        Some(summary)
    }

    fn latency_stats(&self) -> Option<LatencyStats> {
        let avg = average_duration(self.total_duration, self.successes)?;
        let (p50, p90, p99) = self.histogram.percentiles();
        Some(LatencyStats {
            avg_ms: millis(avg),
            fastest_ms: self.fastest.map_or(0, millis),
            slowest_ms: self.slowest.map_or(0, millis),
            p50_ms: millis(p50),
            p90_ms: millis(p90),
            p99_ms: millis(p99),
        })
    }

    fn size_stats(&self) -> Option<SizeStats> {
        let avg_bytes = self.total_bytes.checked_div(self.successes)?;
        Some(SizeStats {
            avg_bytes,
            min_bytes: self.min_bytes.unwrap_or(0),
            max_bytes: self.max_bytes.unwrap_or(0),
            total_bytes: self.total_bytes,
        })
    }

    fn reset(&mut self) {
        self.requests = 0;
        self.errors = 0;
        self.reused = 0;
        self.compressed = 0;
        self.dns_started = 0;
        self.dns_succeeded = 0;
        self.tls_started = 0;
        self.tls_succeeded = 0;
        self.successes = 0;
        self.total_duration = Duration::ZERO;
        self.fastest = None;
        self.slowest = None;
        self.histogram.reset();
        self.total_bytes = 0;
        self.min_bytes = None;
        self.max_bytes = None;
        self.status_codes.clear();
    }
}

const fn bump(counter: &mut u64, flag: bool) {
    if flag {
        *counter = counter.saturating_add(1);
    }
}
