use std::sync::Arc;

use reqwest::Client;

use crate::args::DEFAULT_USER_AGENT;
use crate::error::HttpError;

use super::ProbeSettings;
use super::trace::{ConnectTraceLayer, ConnectionTrace, TracingResolver};

/// Builds a probe's private client. Every new connection and DNS lookup it
/// makes is reported to `trace`.
///
/// # Errors
///
/// Returns an error when the TLS backend or client cannot be initialised.
pub(crate) fn build_client(
    settings: &ProbeSettings,
    trace: &Arc<ConnectionTrace>,
) -> Result<Client, HttpError> {
    let mut client_builder = Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .pool_max_idle_per_host(1)
        .dns_resolver(Arc::new(TracingResolver::new(Arc::clone(trace))))
        .connector_layer(ConnectTraceLayer::new(Arc::clone(trace)));

    if let Some(timeout) = settings.timeout {
        client_builder = client_builder.timeout(timeout);
    }

    client_builder
        .build()
        .map_err(|source| HttpError::BuildClientFailed { source })
}
