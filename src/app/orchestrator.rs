use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, HttpError};
use crate::metrics::setup_aggregator;
use crate::probe::{Event, Probe};
use crate::sinks::ReportSink;

use super::RunSettings;

/// Run every probe plus the aggregator.
///
/// Under normal operation this never returns. It ends with an error when a
/// probe fails fatally or the report sink cannot be written, and with `Ok`
/// once every probe has stopped and the final window has been flushed.
///
/// # Errors
///
/// Returns the first fatal probe error, or the aggregator's sink error.
pub async fn run_probes<S>(settings: &RunSettings, sink: S) -> AppResult<()>
where
    S: ReportSink + 'static,
{
    let (events_tx, events_rx) = mpsc::channel::<Event>(settings.queue_capacity);
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<HttpError>(1);

    let mut aggregator = setup_aggregator(settings.report_interval, sink, events_rx)?;
    let spawner = spawn_probes(settings, events_tx, fatal_tx);
    info!(
        clients = settings.clients,
        stagger_ms = u64::try_from(settings.stagger().as_millis()).unwrap_or(u64::MAX),
        "Starting probes"
    );

    let outcome = tokio::select! {
        Some(err) = fatal_rx.recv() => Err(AppError::from(err)),
        joined = &mut aggregator => joined?.map_err(AppError::from),
    };

    spawner.abort();
    aggregator.abort();
    outcome
}

fn spawn_probes(
    settings: &RunSettings,
    events_tx: mpsc::Sender<Event>,
    fatal_tx: mpsc::Sender<HttpError>,
) -> JoinHandle<()> {
    let probe_settings = Arc::new(settings.probe.clone());
    let clients = settings.clients;
    let stagger = settings.stagger();

    tokio::spawn(async move {
        let mut probes = JoinSet::new();
        for id in 0..clients {
            if id > 0 {
                tokio::time::sleep(stagger).await;
            }
            let probe = match Probe::new(id, Arc::clone(&probe_settings), events_tx.clone()) {
                Ok(probe) => probe,
                Err(err) => {
                    drop(fatal_tx.send(err).await);
                    return;
                }
            };
            let probe_fatal_tx = fatal_tx.clone();
            probes.spawn(async move {
                if let Err(err) = probe.run().await {
                    drop(probe_fatal_tx.send(err).await);
                }
            });
            debug!(probe = id, "Probe spawned");
        }
        drop(events_tx);
        drop(fatal_tx);

        while let Some(joined) = probes.join_next().await {
            if let Err(err) = joined {
                warn!("Probe task ended abnormally: {}", err);
            }
        }
    })
}
