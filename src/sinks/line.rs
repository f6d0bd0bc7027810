use std::future::Future;
use std::path::Path;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::args::OutputFormat;
use crate::error::SinkError;
use crate::metrics::Report;

use super::ReportSink;

/// Writes one line per report, as text or as JSON.
pub struct LineSink {
    format: OutputFormat,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
}

impl std::fmt::Debug for LineSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl LineSink {
    #[must_use]
    pub fn stdout(format: OutputFormat) -> Self {
        Self::from_writer(format, Box::new(tokio::io::stdout()))
    }

    /// Append to `path`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn append(path: &Path, format: OutputFormat) -> Result<Self, SinkError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|err| SinkError::OpenOutput {
                path: path.to_path_buf(),
                source: err,
            })?;
        Ok(Self::from_writer(format, Box::new(file)))
    }

    #[must_use]
    pub const fn from_writer(
        format: OutputFormat,
        writer: Box<dyn AsyncWrite + Unpin + Send>,
    ) -> Self {
        Self { format, writer }
    }

    fn render(&self, report: &Report) -> Result<String, SinkError> {
        let mut line = match self.format {
            OutputFormat::Text => report.to_string(),
            OutputFormat::Json => serde_json::to_string(report)
                .map_err(|err| SinkError::Serialize { source: err })?,
        };
        line.push('\n');
        Ok(line)
    }
}

impl ReportSink for LineSink {
    fn write_report(
        &mut self,
        report: &Report,
    ) -> impl Future<Output = Result<(), SinkError>> + Send {
        let rendered = self.render(report);
        async move {
            let line = rendered?;
            self.writer
                .write_all(line.as_bytes())
                .await
                .map_err(|err| SinkError::WriteLine { source: err })?;
            self.writer
                .flush()
                .await
                .map_err(|err| SinkError::WriteLine { source: err })
        }
    }
}
