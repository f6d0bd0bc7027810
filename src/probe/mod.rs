//! Simulated clients: request cadence, transport tracing and session inference.
mod client;
mod record;
mod runner;
mod session;
mod trace;

#[cfg(test)]
mod tests;

use std::time::Duration;

use url::Url;

pub use record::{Event, RequestRecord, SessionRecord};
pub use runner::Probe;
pub use session::SessionTracker;
pub use trace::{ConnectTraceLayer, ConnectionTrace, TraceSnapshot, TracingResolver};

pub(crate) use record::average_duration;

/// Settings shared by every probe of a run.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub url: Url,
    pub interval: Duration,
    pub lifetime: Duration,
    pub disable_compression: bool,
    pub timeout: Option<Duration>,
}

impl ProbeSettings {
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.url.scheme() == "https"
    }
}
