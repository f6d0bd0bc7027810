use std::fmt;

use serde::Serialize;

use crate::probe::SessionRecord;

use super::millis;
use super::summary::WindowSummary;

/// One finished session as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub timestamp: String,
    pub probe: usize,
    pub lifetime_secs: u64,
    pub actual_ms: u64,
    pub requests: u64,
    pub compressed: u64,
    pub avg_ms: Option<u64>,
    pub fastest_ms: Option<u64>,
    pub slowest_ms: Option<u64>,
    pub errors: u64,
    pub tls_started: u64,
    pub tls_succeeded: u64,
    pub closed_by_client: bool,
    pub prev_errors: u64,
    pub prev_closed_by_client: bool,
}

impl SessionReport {
    /// Builds the report for `record`, or `None` for a session that must not
    /// be shown (the placeholder a probe holds before its first connection).
    #[must_use]
    pub fn from_record(record: &SessionRecord, timestamp: String) -> Option<Self> {
        if !record.is_reportable() {
            return None;
        }
        let actual = record.duration?;
        Some(Self {
            timestamp,
            probe: record.probe_id,
            lifetime_secs: record.requested_lifetime.as_secs(),
            actual_ms: millis(actual),
            requests: record.requests,
            compressed: record.compressed_requests,
            avg_ms: record.average().map(millis),
            fastest_ms: record.fastest.map(millis),
            slowest_ms: record.slowest.map(millis),
            errors: record.errors,
            tls_started: record.tls_started,
            tls_succeeded: record.tls_succeeded,
            closed_by_client: record.closed_by_client,
            prev_errors: record.prev_errors,
            prev_closed_by_client: record.prev_closed_by_client,
        })
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} session probe:{} lifetime:{}s actual:{}ms requests:{} compressed:{}",
            self.timestamp,
            self.probe,
            self.lifetime_secs,
            self.actual_ms,
            self.requests,
            self.compressed
        )?;
        if let (Some(avg), Some(fastest), Some(slowest)) =
            (self.avg_ms, self.fastest_ms, self.slowest_ms)
        {
            write!(f, " avg:{}ms fastest:{}ms slowest:{}ms", avg, fastest, slowest)?;
        }
        write!(
            f,
            " errors:{} tls:{}/{} client_close:{} prev_errors:{} prev_client_close:{}",
            self.errors,
            self.tls_started,
            self.tls_succeeded,
            self.closed_by_client,
            self.prev_errors,
            self.prev_closed_by_client
        )
    }
}

/// A line of program output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Window(WindowSummary),
    Session(SessionReport),
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window(summary) => fmt::Display::fmt(summary, f),
            Self::Session(report) => fmt::Display::fmt(report, f),
        }
    }
}
