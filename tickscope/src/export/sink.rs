//! Delivery of finished reports

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::SamplerReport;
use crate::domain::ExportError;

/// Receives the report when a session completes
pub trait ResultSink: Send {
    /// # Errors
    /// Any delivery failure; the sampler logs it and still completes
    fn deliver(&mut self, report: &SamplerReport) -> anyhow::Result<()>;
}

/// Sink forwarding the report to a closure
pub struct CallbackSink<F>(pub F);

impl<F> ResultSink for CallbackSink<F>
where
    F: FnMut(&SamplerReport) -> anyhow::Result<()> + Send,
{
    fn deliver(&mut self, report: &SamplerReport) -> anyhow::Result<()> {
        (self.0)(report)
    }
}

/// Writes reports as pretty-printed JSON
pub struct JsonExporter;

impl JsonExporter {
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(report: &SamplerReport, mut writer: W) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush()?;
        Ok(())
    }
}

/// Sink writing the report to a JSON file
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for JsonFileSink {
    fn deliver(&mut self, report: &SamplerReport) -> anyhow::Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        JsonExporter::export(report, BufWriter::new(file))
            .map_err(|e| {
                ExportError::WriteFailed(format!("{}: {e}", self.path.display()))
            })?;
        Ok(())
    }
}
