use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::error::{MetricsError, SinkError};
use crate::probe::Event;
use crate::sinks::ReportSink;

use super::report::{Report, SessionReport};
use super::summary::{RollingSummary, WindowSummary};

/// Single consumer of every probe's events.
///
/// Session events are turned into reports right away; request events only
/// feed the current window until the next flush.
#[derive(Debug)]
pub struct Aggregator {
    window: RollingSummary,
}

impl Aggregator {
    /// # Errors
    ///
    /// Returns an error if the window's histogram cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            window: RollingSummary::new()?,
        })
    }

    /// Consume one event. Returns the report to emit for a finished session.
    pub fn handle(&mut self, event: Event) -> Option<SessionReport> {
        match event {
            Event::Request(request) => {
                if let Err(err) = self.window.record(&request) {
                    warn!("Failed to record request latency: {}", err);
                }
                None
            }
            Event::Session(session) => {
                let report = SessionReport::from_record(&session, now_rfc3339());
                if report.is_none() {
                    debug!(probe = session.probe_id, "Suppressed placeholder session");
                }
                report
            }
        }
    }

    /// Close the current window; `None` when it saw no requests.
    pub fn flush(&mut self) -> Option<WindowSummary> {
        self.window.take(now_rfc3339())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Spawn the aggregator task.
///
/// The task runs until every event sender is gone, flushing a final window
/// before it returns.
///
/// # Errors
///
/// Returns an error if the aggregator cannot be created. The task itself
/// fails when the sink cannot be written.
pub fn setup_aggregator<S>(
    report_interval: Duration,
    mut sink: S,
    mut events_rx: mpsc::Receiver<Event>,
) -> Result<JoinHandle<Result<(), SinkError>>, MetricsError>
where
    S: ReportSink + 'static,
{
    let mut aggregator = Aggregator::new()?;

    Ok(tokio::spawn(async move {
        let first_flush = Instant::now()
            .checked_add(report_interval)
            .unwrap_or_else(Instant::now);
        let mut flush_interval = tokio::time::interval_at(first_flush, report_interval);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_event = events_rx.recv() => {
                    let Some(event) = maybe_event else {
                        break;
                    };
                    if let Some(report) = aggregator.handle(event) {
                        sink.write_report(&Report::Session(report)).await?;
                    }
                },
                _ = flush_interval.tick() => {
                    if let Some(summary) = aggregator.flush() {
                        sink.write_report(&Report::Window(summary)).await?;
                    }
                }
            }
        }

        if let Some(summary) = aggregator.flush() {
            sink.write_report(&Report::Window(summary)).await?;
        }
        debug!("Event queue closed; aggregator stopped");
        Ok(())
    }))
}
