use std::time::Duration;

/// Outcome of a single probe request.
///
/// The probe keeps one live record, resets it before each request and sends a
/// copy once the request has completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestRecord {
    /// Response status; `None` when no response was received.
    pub status_code: Option<u16>,
    pub duration: Duration,
    pub failed: bool,
    /// Body bytes as received on the wire, still encoded when compressed.
    pub content_length: u64,
    pub used_compression: bool,
    pub reused_connection: bool,
    pub dns_started: bool,
    pub dns_succeeded: bool,
    pub tls_started: bool,
    pub tls_succeeded: bool,
}

impl RequestRecord {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Rollup of the requests carried by one inferred TCP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub probe_id: usize,
    pub requested_lifetime: Duration,
    /// Time between this session's connection and the connection that
    /// superseded it. `None` for the placeholder session a probe holds before
    /// its first connection.
    pub duration: Option<Duration>,
    pub requests: u64,
    pub compressed_requests: u64,
    pub fastest: Option<Duration>,
    pub slowest: Option<Duration>,
    pub total: Duration,
    pub errors: u64,
    pub tls_started: u64,
    pub tls_succeeded: u64,
    pub closed_by_client: bool,
    pub prev_errors: u64,
    pub prev_closed_by_client: bool,
}

impl SessionRecord {
    #[must_use]
    pub const fn new(probe_id: usize, requested_lifetime: Duration) -> Self {
        Self {
            probe_id,
            requested_lifetime,
            duration: None,
            requests: 0,
            compressed_requests: 0,
            fastest: None,
            slowest: None,
            total: Duration::ZERO,
            errors: 0,
            tls_started: 0,
            tls_succeeded: 0,
            closed_by_client: false,
            prev_errors: 0,
            prev_closed_by_client: false,
        }
    }

    /// Fresh session that carries the error/close outcome of `previous`.
    #[must_use]
    pub const fn succeeding(previous: &SessionRecord) -> Self {
        let mut next = Self::new(previous.probe_id, previous.requested_lifetime);
        next.prev_errors = previous.errors;
        next.prev_closed_by_client = previous.closed_by_client;
        next
    }

    /// Whether this record describes a real, measured session.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        self.duration.is_some_and(|duration| !duration.is_zero())
    }

    /// Mean request duration over every request in the session.
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        average_duration(self.total, self.requests)
    }

    pub(crate) fn record_request(&mut self, request: &RequestRecord) {
        self.requests = self.requests.saturating_add(1);
        if request.failed {
            self.errors = self.errors.saturating_add(1);
        }
        self.total = self.total.saturating_add(request.duration);
        self.fastest = Some(
            self.fastest
                .map_or(request.duration, |fastest| fastest.min(request.duration)),
        );
        self.slowest = Some(
            self.slowest
                .map_or(request.duration, |slowest| slowest.max(request.duration)),
        );
        if request.used_compression {
            self.compressed_requests = self.compressed_requests.saturating_add(1);
        }
        if request.tls_started {
            self.tls_started = self.tls_started.saturating_add(1);
        }
        if request.tls_succeeded {
            self.tls_succeeded = self.tls_succeeded.saturating_add(1);
        }
    }
}

/// Integer mean in nanoseconds, truncating.
pub(crate) fn average_duration(total: Duration, count: u64) -> Option<Duration> {
    let avg = total.as_nanos().checked_div(u128::from(count))?;
    Some(Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX)))
}

/// A record leaving a probe for the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Request(RequestRecord),
    Session(SessionRecord),
}
