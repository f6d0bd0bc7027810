//! Per-probe observation of the HTTP transport.
//!
//! `reqwest` has no per-request trace hooks, so a probe's client is built with
//! a resolver and a connector layer that report into a shared
//! [`ConnectionTrace`]. A probe has at most one request in flight, so the
//! trace always describes the request currently being made.
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::time::Instant;
use tower::{Layer, Service};

type BoxError = Box<dyn Error + Send + Sync>;

/// What the transport did while serving one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceSnapshot {
    pub dns_started: bool,
    pub dns_succeeded: bool,
    pub connect_attempted: bool,
    pub tls_started: bool,
    pub tls_succeeded: bool,
    /// Set when a new physical connection was established.
    pub connected_at: Option<Instant>,
}

#[derive(Debug)]
pub struct ConnectionTrace {
    tls: bool,
    state: Mutex<TraceSnapshot>,
}

impl ConnectionTrace {
    /// `tls` marks whether new connections to the target perform a TLS handshake.
    #[must_use]
    pub fn new(tls: bool) -> Self {
        Self {
            tls,
            state: Mutex::new(TraceSnapshot::default()),
        }
    }

    pub fn reset(&self) {
        *self.lock() = TraceSnapshot::default();
    }

    #[must_use]
    pub fn snapshot(&self) -> TraceSnapshot {
        *self.lock()
    }

    pub(crate) fn dns_started(&self) {
        self.lock().dns_started = true;
    }

    pub(crate) fn dns_finished(&self, succeeded: bool) {
        if succeeded {
            self.lock().dns_succeeded = true;
        }
    }

    pub(crate) fn connect_started(&self) {
        let mut state = self.lock();
        state.connect_attempted = true;
        if self.tls {
            state.tls_started = true;
        }
    }

    pub(crate) fn connected(&self, now: Instant) {
        let mut state = self.lock();
        if self.tls {
            state.tls_succeeded = true;
        }
        state.connected_at = Some(now);
    }

    /// A connect that failed before a TCP connection existed never began a
    /// handshake.
    pub(crate) fn connect_failed(&self, reached_handshake: bool) {
        if !reached_handshake {
            self.lock().tls_started = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, TraceSnapshot> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Connector layer; every call of the wrapped service opens one new connection.
#[derive(Debug, Clone)]
pub struct ConnectTraceLayer {
    trace: Arc<ConnectionTrace>,
}

impl ConnectTraceLayer {
    #[must_use]
    pub const fn new(trace: Arc<ConnectionTrace>) -> Self {
        Self { trace }
    }
}

impl<S> Layer<S> for ConnectTraceLayer {
    type Service = ConnectTrace<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConnectTrace {
            inner,
            trace: Arc::clone(&self.trace),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectTrace<S> {
    inner: S,
    trace: Arc<ConnectionTrace>,
}

impl<S, R> Service<R> for ConnectTrace<S>
where
    S: Service<R, Error = BoxError>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: R) -> Self::Future {
        let trace = Arc::clone(&self.trace);
        trace.connect_started();
        let connecting = self.inner.call(request);
        Box::pin(async move {
            let result = connecting.await;
            match &result {
                Ok(_) => trace.connected(Instant::now()),
                Err(err) => trace.connect_failed(reached_handshake(&**err)),
            }
            result
        })
    }
}

/// Whether a connector error happened after TCP connected, i.e. during TLS.
///
/// DNS and TCP failures surface from the connector as an `io::Error` of a
/// connect kind, or wrapped with a "dns error"/"tcp connect error" message.
fn reached_handshake(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::AddrNotAvailable
                    | io::ErrorKind::HostUnreachable
                    | io::ErrorKind::NetworkUnreachable
            )
        {
            return false;
        }
        let message = cause.to_string();
        if message.starts_with("tcp connect error") || message.starts_with("dns error") {
            return false;
        }
        current = cause.source();
    }
    true
}

/// System resolver that records lookups into the trace.
#[derive(Debug, Clone)]
pub struct TracingResolver {
    trace: Arc<ConnectionTrace>,
}

impl TracingResolver {
    #[must_use]
    pub const fn new(trace: Arc<ConnectionTrace>) -> Self {
        Self { trace }
    }
}

impl Resolve for TracingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let trace = Arc::clone(&self.trace);
        trace.dns_started();
        let host = name.as_str().to_owned();
        Box::pin(async move {
            let resolved: Result<Addrs, BoxError> =
                match tokio::net::lookup_host((host.as_str(), 0)).await {
                    Ok(found) => {
                        let addrs: Vec<SocketAddr> = found.collect();
                        trace.dns_finished(!addrs.is_empty());
                        let addrs: Addrs = Box::new(addrs.into_iter());
                        Ok(addrs)
                    }
                    Err(err) => {
                        trace.dns_finished(false);
                        let err: BoxError = Box::new(err);
                        Err(err)
                    }
                };
            resolved
        })
    }
}
