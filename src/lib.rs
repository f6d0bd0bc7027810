//! Core library for the `polltrace` CLI.
//!
//! `polltrace` runs one or more simulated HTTP clients ("probes") against a
//! target URL. Each probe issues a GET on a fixed cadence over its own
//! connection pool, infers TCP session boundaries from whether a request
//! opened a new connection, and drops its idle connection once the session
//! lifetime elapses. A single aggregator reports every finished session and
//! flushes windowed request statistics on a fixed interval.
pub mod app;
pub mod args;
pub mod config;
pub mod entry;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod sinks;
pub mod system;

#[cfg(test)]
mod test_support;
