//! Shared helpers for unit tests: a runtime driver and a tiny HTTP/1.1 server.
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

pub(crate) const BODY: &[u8] = b"hello probe";

/// How long a [`ServerMode::SlowKeepAlive`] server waits before answering.
pub(crate) const SLOW_RESPONSE: Duration = Duration::from_millis(60);

pub(crate) fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

#[derive(Clone, Copy)]
pub(crate) enum ServerMode {
    KeepAlive,
    CloseEach,
    /// Keep-alive, but every response is held back by [`SLOW_RESPONSE`].
    SlowKeepAlive,
}

/// Answers every GET with [`BODY`]. Responses are marked gzip-encoded when the
/// request asked for gzip.
pub(crate) struct TestServer {
    pub(crate) url: Url,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) async fn spawn_server(mode: ServerMode) -> Result<TestServer, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("Failed to bind test server: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("Failed to read test server addr: {}", err))?;
    let url = Url::parse(&format!("http://{}/", addr))
        .map_err(|err| format!("Failed to build test url: {}", err))?;
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream.set_nodelay(true));
            tokio::spawn(serve_connection(stream, mode));
        }
    });
    Ok(TestServer {
        url,
        connections,
        task,
    })
}

/// A URL on 127.0.0.1 where nothing listens.
pub(crate) async fn closed_port_url() -> Result<Url, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("Failed to bind: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("Failed to read addr: {}", err))?;
    drop(listener);
    Url::parse(&format!("http://{}/", addr)).map_err(|err| format!("Failed to build url: {}", err))
}

async fn serve_connection(mut stream: TcpStream, mode: ServerMode) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0_u8; 1024];
    loop {
        let read = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(read) => read,
        };
        pending.extend_from_slice(buf.get(..read).unwrap_or_default());
        let Some(head_end) = pending.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(pending.get(..head_end).unwrap_or_default())
            .to_ascii_lowercase();
        pending.clear();

        let encoding = if head.contains("accept-encoding: gzip") {
            "Content-Encoding: gzip\r\n"
        } else {
            ""
        };
        let connection = match mode {
            ServerMode::KeepAlive | ServerMode::SlowKeepAlive => "keep-alive",
            ServerMode::CloseEach => "close",
        };
        if matches!(mode, ServerMode::SlowKeepAlive) {
            tokio::time::sleep(SLOW_RESPONSE).await;
        }
        // Head and body in a single write.
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: {}\r\n\r\n",
            BODY.len(),
            encoding,
            connection
        )
        .into_bytes();
        response.extend_from_slice(BODY);
        if stream.write_all(&response).await.is_err() {
            return;
        }
        if matches!(mode, ServerMode::CloseEach) {
            drop(stream.shutdown().await);
            return;
        }
    }
}
