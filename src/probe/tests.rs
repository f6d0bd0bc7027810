use super::*;
use crate::test_support::{
    BODY, SLOW_RESPONSE, ServerMode, closed_port_url, run_async_test, spawn_server,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

fn settings(url: Url, interval_ms: u64, lifetime_ms: u64) -> Arc<ProbeSettings> {
    Arc::new(ProbeSettings {
        url,
        interval: Duration::from_millis(interval_ms),
        lifetime: Duration::from_millis(lifetime_ms),
        disable_compression: false,
        timeout: Some(Duration::from_secs(2)),
    })
}

/// Runs a probe for `run_for` and returns everything it emitted.
async fn collect_events(
    probe_settings: Arc<ProbeSettings>,
    run_for: Duration,
) -> Result<Vec<Event>, String> {
    let (events_tx, mut events_rx) = mpsc::channel::<Event>(100);
    let probe = Probe::new(0, probe_settings, events_tx)
        .map_err(|err| format!("Failed to build probe: {}", err))?;
    let handle = tokio::spawn(probe.run());

    let deadline = Instant::now()
        .checked_add(run_for)
        .ok_or_else(|| "deadline overflow".to_owned())?;
    let mut events = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, events_rx.recv()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => return Err("Probe stopped unexpectedly".to_owned()),
            Err(_elapsed) => break,
        }
    }
    handle.abort();
    Ok(events)
}

fn requests(events: &[Event]) -> Vec<&RequestRecord> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Request(record) => Some(record),
            Event::Session(_) => None,
        })
        .collect()
}

fn sessions(events: &[Event]) -> Vec<&SessionRecord> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Session(record) => Some(record),
            Event::Request(_) => None,
        })
        .collect()
}

#[test]
fn first_connection_emits_placeholder_before_request() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(ServerMode::KeepAlive).await?;
        let events = collect_events(
            settings(server.url.clone(), 20, 60_000),
            Duration::from_millis(200),
        )
        .await?;

        match (events.first(), events.get(1)) {
            (Some(Event::Session(session)), Some(Event::Request(request))) => {
                if session.is_reportable() {
                    return Err("Placeholder session must not be reportable".to_owned());
                }
                if request.reused_connection {
                    return Err("First request cannot reuse a connection".to_owned());
                }
                if request.failed || request.status_code != Some(200) {
                    return Err(format!("Unexpected first request: {:?}", request));
                }
                if request.content_length != u64::try_from(BODY.len()).unwrap_or(0) {
                    return Err(format!("Unexpected size: {}", request.content_length));
                }
            }
            other => return Err(format!("Unexpected leading events: {:?}", other)),
        }
        Ok(())
    })
}

#[test]
fn keep_alive_requests_reuse_one_connection() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(ServerMode::KeepAlive).await?;
        let events = collect_events(
            settings(server.url.clone(), 20, 60_000),
            Duration::from_millis(300),
        )
        .await?;

        let records = requests(&events);
        if records.len() < 3 {
            return Err(format!("Expected several requests, got {}", records.len()));
        }
        if records.iter().skip(1).any(|record| !record.reused_connection) {
            return Err("Follow-up requests should reuse the connection".to_owned());
        }
        if sessions(&events).len() != 1 {
            return Err("Only the placeholder session should be emitted".to_owned());
        }
        if server.connections() != 1 {
            return Err("Server should have seen one connection".to_owned());
        }
        if records.iter().any(|record| !record.used_compression) {
            return Err("Encoded responses should be marked compressed".to_owned());
        }
        Ok(())
    })
}

#[test]
fn slow_responses_keep_the_session_open() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(ServerMode::SlowKeepAlive).await?;
        let events = collect_events(
            settings(server.url.clone(), 20, 60_000),
            Duration::from_millis(700),
        )
        .await?;

        let records = requests(&events);
        if records.len() < 3 {
            return Err(format!("Expected several requests, got {}", records.len()));
        }
        if records.iter().any(|record| record.duration < SLOW_RESPONSE) {
            return Err("Every response should outlast the interval".to_owned());
        }
        if records.iter().skip(1).any(|record| !record.reused_connection) {
            return Err("Requests after a slow response should reuse the connection".to_owned());
        }
        if sessions(&events).len() != 1 {
            return Err("Slow responses must not end the session".to_owned());
        }
        if server.connections() != 1 {
            return Err(format!(
                "Server should have seen one connection, got {}",
                server.connections()
            ));
        }
        Ok(())
    })
}

#[test]
fn session_lifetime_closes_connection() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(ServerMode::KeepAlive).await?;
        let events = collect_events(
            settings(server.url.clone(), 25, 250),
            Duration::from_millis(900),
        )
        .await?;

        let closed: Vec<&SessionRecord> = sessions(&events)
            .into_iter()
            .filter(|session| session.is_reportable())
            .collect();
        let Some(first) = closed.first() else {
            return Err("Expected a session closed by its lifetime".to_owned());
        };
        if !first.closed_by_client {
            return Err("Session should be marked closed by the client".to_owned());
        }
        if first.requests == 0 || first.errors != 0 {
            return Err(format!("Unexpected session rollup: {:?}", first));
        }
        if first.duration < Some(Duration::from_millis(200)) {
            return Err(format!("Session ended too early: {:?}", first.duration));
        }
        if server.connections() < 2 {
            return Err("Expected a fresh connection after the lifetime".to_owned());
        }
        Ok(())
    })
}

#[test]
fn server_close_starts_new_session_each_request() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(ServerMode::CloseEach).await?;
        let events = collect_events(
            settings(server.url.clone(), 30, 60_000),
            Duration::from_millis(300),
        )
        .await?;

        let records = requests(&events);
        if records.len() < 3 {
            return Err(format!("Expected several requests, got {}", records.len()));
        }
        if records.iter().any(|record| record.reused_connection) {
            return Err("Closed connections cannot be reused".to_owned());
        }
        let reportable: Vec<&SessionRecord> = sessions(&events)
            .into_iter()
            .filter(|session| session.is_reportable())
            .collect();
        if reportable.len().saturating_add(1) < records.len() {
            return Err("Every new connection should close the previous session".to_owned());
        }
        if reportable
            .iter()
            .any(|session| session.requests != 1 || session.closed_by_client)
        {
            return Err("Each session should hold exactly one server-closed request".to_owned());
        }
        Ok(())
    })
}

#[test]
fn disabled_compression_sends_no_accept_encoding() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(ServerMode::KeepAlive).await?;
        let probe_settings = Arc::new(ProbeSettings {
            disable_compression: true,
            ..(*settings(server.url.clone(), 20, 60_000)).clone()
        });
        let events = collect_events(probe_settings, Duration::from_millis(150)).await?;

        let records = requests(&events);
        if records.is_empty() {
            return Err("Expected at least one request".to_owned());
        }
        if records.iter().any(|record| record.used_compression) {
            return Err("Compression should not be reported".to_owned());
        }
        Ok(())
    })
}

#[test]
fn unreachable_target_records_failures() -> Result<(), String> {
    run_async_test(async {
        let url = closed_port_url().await?;
        let events = collect_events(settings(url, 20, 60_000), Duration::from_millis(200)).await?;
        let records = requests(&events);
        if records.is_empty() {
            return Err("Failed requests should still be emitted".to_owned());
        }
        if records
            .iter()
            .any(|record| !record.failed || record.status_code.is_some())
        {
            return Err("Every request should fail without a status".to_owned());
        }
        if records.iter().any(|record| record.reused_connection) {
            return Err("Failed connects are not reuse".to_owned());
        }
        if !sessions(&events).is_empty() {
            return Err("No session without a connection".to_owned());
        }
        Ok(())
    })
}

#[test]
fn refused_https_target_never_starts_tls() -> Result<(), String> {
    run_async_test(async {
        let mut url = closed_port_url().await?;
        url.set_scheme("https")
            .map_err(|()| "Failed to switch the url to https".to_owned())?;
        let events = collect_events(settings(url, 20, 60_000), Duration::from_millis(200)).await?;

        let records = requests(&events);
        if records.is_empty() {
            return Err("Failed requests should still be emitted".to_owned());
        }
        if records.iter().any(|record| !record.failed) {
            return Err("Every request should fail".to_owned());
        }
        if records
            .iter()
            .any(|record| record.tls_started || record.tls_succeeded)
        {
            return Err("A refused connect must not count a TLS handshake".to_owned());
        }
        Ok(())
    })
}

#[test]
fn hostname_target_records_dns_lookup() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(ServerMode::KeepAlive).await?;
        let port = server
            .url
            .port()
            .ok_or_else(|| "Test url has no port".to_owned())?;
        let url = Url::parse(&format!("http://localhost:{}/", port))
            .map_err(|err| format!("Failed to build url: {}", err))?;
        let events = collect_events(settings(url, 20, 60_000), Duration::from_millis(200)).await?;

        let Some(first) = requests(&events).first().copied() else {
            return Err("Expected at least one request".to_owned());
        };
        if !first.dns_started {
            return Err("First request should have resolved the host".to_owned());
        }
        if first.tls_started || first.tls_succeeded {
            return Err("Plain http must not report TLS".to_owned());
        }
        Ok(())
    })
}
