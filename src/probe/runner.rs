use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, HeaderMap};
use reqwest::{Client, Request};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::HttpError;

use super::ProbeSettings;
use super::client::build_client;
use super::record::{Event, RequestRecord};
use super::session::SessionTracker;
use super::trace::{ConnectionTrace, TraceSnapshot};

enum Step {
    Continue,
    SinkClosed,
}

/// One simulated client.
///
/// Owns its HTTP client, its live request record and its session tracker; all
/// of them are only touched from the probe's own task.
#[derive(Debug)]
pub struct Probe {
    id: usize,
    settings: Arc<ProbeSettings>,
    client: Client,
    trace: Arc<ConnectionTrace>,
    request: RequestRecord,
    session: SessionTracker,
    events: mpsc::Sender<Event>,
}

impl Probe {
    /// Creates a probe with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(
        id: usize,
        settings: Arc<ProbeSettings>,
        events: mpsc::Sender<Event>,
    ) -> Result<Self, HttpError> {
        let trace = Arc::new(ConnectionTrace::new(settings.uses_tls()));
        let client = build_client(&settings, &trace)?;
        let session = SessionTracker::new(id, settings.lifetime);
        Ok(Self {
            id,
            settings,
            client,
            trace,
            request: RequestRecord::default(),
            session,
            events,
        })
    }

    /// Runs the probing loop until the event queue is closed.
    ///
    /// # Errors
    ///
    /// Returns an error when an outbound request cannot be built, which means
    /// every further request would fail as well.
    pub async fn run(mut self) -> Result<(), HttpError> {
        let mut request_ticker = periodic(self.settings.interval);
        let mut session_ticker = periodic(self.settings.lifetime);
        debug!(probe = self.id, "Probe started");

        loop {
            let step = tokio::select! {
                due = request_ticker.tick() => {
                    let outcome = self.request_tick(&mut session_ticker).await?;
                    // Ticks missed during a slow request are dropped; the
                    // next request waits a full interval.
                    if due.elapsed() >= self.settings.interval {
                        request_ticker.reset();
                    }
                    outcome
                }
                _ = session_ticker.tick() => {
                    self.session_tick();
                    Step::Continue
                }
            };
            if matches!(step, Step::SinkClosed) {
                debug!(probe = self.id, "Event queue closed; probe stopping");
                return Ok(());
            }
        }
    }

    async fn request_tick(&mut self, session_ticker: &mut Interval) -> Result<Step, HttpError> {
        self.request.reset();
        self.trace.reset();
        let request = self.build_request()?;

        let started = Instant::now();
        match self.client.execute(request).await {
            Ok(response) => {
                self.request.status_code = Some(response.status().as_u16());
                self.request.used_compression =
                    !self.settings.disable_compression && is_encoded(response.headers());
                match drain_response_body(response).await {
                    Ok(bytes) => self.request.content_length = bytes,
                    Err(err) => {
                        warn!(probe = self.id, "Failed to read response body: {}", err);
                        self.request.failed = true;
                    }
                }
            }
            Err(err) => {
                warn!(probe = self.id, "Request failed: {}", err);
                self.request.failed = true;
            }
        }
        self.request.duration = started.elapsed();

        let trace = self.trace.snapshot();
        apply_trace(&mut self.request, &trace);

        if let Some(connected_at) = trace.connected_at {
            let closed = self.session.connection_opened(connected_at);
            session_ticker.reset();
            debug!(
                probe = self.id,
                closed_by_client = closed.closed_by_client,
                requests = closed.requests,
                "New connection; session superseded"
            );
            if !self.emit(Event::Session(closed)).await {
                return Ok(Step::SinkClosed);
            }
        }

        if !self.emit(Event::Request(self.request.clone())).await {
            return Ok(Step::SinkClosed);
        }
        self.session.record_request(&self.request);
        Ok(Step::Continue)
    }

    fn session_tick(&mut self) {
        // Dropping the old client closes its pooled connections.
        match build_client(&self.settings, &self.trace) {
            Ok(client) => self.client = client,
            Err(err) => warn!(probe = self.id, "Failed to rebuild HTTP client: {}", err),
        }
        self.session.close_requested();
        debug!(probe = self.id, "Session lifetime elapsed; idle connections dropped");
    }

    fn build_request(&self) -> Result<Request, HttpError> {
        let mut request_builder = self.client.get(self.settings.url.clone());
        if !self.settings.disable_compression {
            request_builder = request_builder.header(ACCEPT_ENCODING, "gzip");
        }
        request_builder
            .build()
            .map_err(|source| HttpError::BuildRequestFailed {
                probe: self.id,
                source,
            })
    }

    async fn emit(&self, event: Event) -> bool {
        self.events.send(event).await.is_ok()
    }
}

fn periodic(period: Duration) -> Interval {
    let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

const fn apply_trace(request: &mut RequestRecord, trace: &TraceSnapshot) {
    request.dns_started = trace.dns_started;
    request.dns_succeeded = trace.dns_succeeded;
    request.tls_started = trace.tls_started;
    request.tls_succeeded = trace.tls_succeeded;
    request.reused_connection = !trace.connect_attempted;
}

fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            let value = value.trim();
            !value.is_empty() && !value.eq_ignore_ascii_case("identity")
        })
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}
