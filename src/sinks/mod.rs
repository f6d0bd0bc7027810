//! Destinations for report lines.
mod line;

use std::future::Future;

use crate::error::SinkError;
use crate::metrics::Report;

pub use line::LineSink;

/// Receives every report the aggregator produces, in order.
pub trait ReportSink: Send {
    /// # Errors
    ///
    /// Returns an error when the report cannot be rendered or written.
    fn write_report(
        &mut self,
        report: &Report,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}
