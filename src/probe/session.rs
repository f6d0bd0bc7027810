use std::time::Duration;

use tokio::time::Instant;

use super::record::{RequestRecord, SessionRecord};

/// Infers TCP session boundaries for one probe.
///
/// The transport only tells us, per request, whether a new physical connection
/// was opened. A new connection ends the live session and starts the next one;
/// the session timer can only ask for a close, it never ends a session itself.
#[derive(Debug)]
pub struct SessionTracker {
    started_at: Option<Instant>,
    live: SessionRecord,
}

impl SessionTracker {
    #[must_use]
    pub const fn new(probe_id: usize, requested_lifetime: Duration) -> Self {
        Self {
            started_at: None,
            live: SessionRecord::new(probe_id, requested_lifetime),
        }
    }

    #[must_use]
    pub const fn live(&self) -> &SessionRecord {
        &self.live
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Closes the live session at `now` and opens a new one.
    ///
    /// Returns the closed session. Before the first connection the closed
    /// record is the placeholder session and carries no duration.
    pub fn connection_opened(&mut self, now: Instant) -> SessionRecord {
        self.live.duration = self
            .started_at
            .map(|started_at| now.saturating_duration_since(started_at));
        let next = SessionRecord::succeeding(&self.live);
        self.started_at = Some(now);
        std::mem::replace(&mut self.live, next)
    }

    /// Marks the live session as closed by the client. Repeated calls are no-ops.
    pub const fn close_requested(&mut self) {
        self.live.closed_by_client = true;
    }

    pub fn record_request(&mut self, request: &RequestRecord) {
        self.live.record_request(request);
    }
}
