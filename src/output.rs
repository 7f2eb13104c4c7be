// src/output.rs
use crate::types::{OutputConfig, OutputFormat, ProbeResult, ProbeRow, WpFinderError};
use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tokio::sync::mpsc;

/// Renders the result stream as console lines, CSV or JSON.
pub struct OutputManager {
    config: OutputConfig,
    file: Option<BufWriter<File>>,
}

/// Incremental renderer for one output format.
enum RowSink<W: Write> {
    Text(W),
    Csv(csv::Writer<W>),
    Json(W, Vec<ProbeRow>),
}

impl<W: Write> RowSink<W> {
    fn new(format: OutputFormat, mut writer: W) -> Result<Self, WpFinderError> {
        match format {
            OutputFormat::Text => {
                writeln!(writer, "{}", ProbeRow::COLUMNS.join("; "))
                    .map_err(|e| WpFinderError::OutputError(e.to_string()))?;
                Ok(RowSink::Text(writer))
            }
            OutputFormat::Csv => {
                let mut csv_writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(writer);
                csv_writer
                    .write_record(ProbeRow::COLUMNS)
                    .map_err(|e| WpFinderError::OutputError(e.to_string()))?;
                Ok(RowSink::Csv(csv_writer))
            }
            OutputFormat::Json => Ok(RowSink::Json(writer, Vec::new())),
        }
    }

    fn push(&mut self, result: &ProbeResult) -> Result<(), WpFinderError> {
        match self {
            RowSink::Text(writer) => writeln!(writer, "{}", result)
                .map_err(|e| WpFinderError::OutputError(e.to_string())),
            RowSink::Csv(writer) => {
                writer
                    .serialize(result.to_row())
                    .map_err(|e| WpFinderError::OutputError(e.to_string()))?;
                // Keep the file current while a long run is in progress.
                writer
                    .flush()
                    .map_err(|e| WpFinderError::OutputError(e.to_string()))
            }
            RowSink::Json(_, rows) => {
                rows.push(result.to_row());
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<(), WpFinderError> {
        let flushed = match self {
            RowSink::Text(mut writer) => writer.flush(),
            RowSink::Csv(mut writer) => writer.flush(),
            RowSink::Json(writer, rows) => return write_json(writer, &rows),
        };
        flushed.map_err(|e| WpFinderError::OutputError(e.to_string()))
    }
}

fn write_json<W: Write>(mut writer: W, rows: &[ProbeRow]) -> Result<(), WpFinderError> {
    serde_json::to_writer_pretty(&mut writer, rows)
        .map_err(|e| WpFinderError::OutputError(format!("Failed to serialize JSON: {}", e)))?;
    writeln!(writer).map_err(|e| WpFinderError::OutputError(e.to_string()))?;
    writer.flush().map_err(|e| WpFinderError::OutputError(e.to_string()))
}

fn create_file(file_path: &str) -> Result<File, WpFinderError> {
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WpFinderError::OutputError(format!("Failed to create directory: {}", e)))?;
        }
    }

    File::create(file_path)
        .map_err(|e| WpFinderError::OutputError(format!("Failed to create file {}: {}", file_path, e)))
}

async fn drain_all(results: &mut mpsc::Receiver<ProbeResult>) -> Vec<ProbeResult> {
    let mut all = Vec::new();
    while let Some(result) = results.recv().await {
        all.push(result);
    }
    all
}

impl OutputManager {
    /// Opens the output file, if any, so an unwritable path fails before the
    /// run starts. Nothing is written to it until results arrive.
    pub fn open(config: OutputConfig) -> Result<Self, WpFinderError> {
        let file = match &config.file {
            Some(file_path) => Some(BufWriter::new(create_file(file_path)?)),
            None => None,
        };
        Ok(Self { config, file })
    }

    /// Drains the stream until it closes and returns how many results were written.
    /// JSON is only serialized once the stream is complete.
    pub async fn consume(mut self, mut results: mpsc::Receiver<ProbeResult>) -> Result<usize, WpFinderError> {
        let count = match self.file.take() {
            Some(file) => self.drain(RowSink::new(self.config.format, file)?, &mut results).await?,
            None => self.drain(RowSink::new(self.config.format, io::stdout())?, &mut results).await?,
        };

        if let Some(file_path) = &self.config.file {
            info!("Results saved to {}", file_path);
        }
        Ok(count)
    }

    /// Same as `consume`, rendering into an arbitrary writer.
    pub async fn consume_into<W: Write>(
        &self,
        writer: W,
        mut results: mpsc::Receiver<ProbeResult>,
    ) -> Result<usize, WpFinderError> {
        self.drain(RowSink::new(self.config.format, writer)?, &mut results).await
    }

    async fn drain<W: Write>(
        &self,
        mut sink: RowSink<W>,
        results: &mut mpsc::Receiver<ProbeResult>,
    ) -> Result<usize, WpFinderError> {
        let mut count = 0;

        if self.config.sort {
            let mut all = drain_all(results).await;
            all.sort();
            for result in &all {
                sink.push(result)?;
                count += 1;
            }
        } else {
            while let Some(result) = results.recv().await {
                sink.push(&result)?;
                count += 1;
            }
        }

        sink.finish()?;
        Ok(count)
    }
}
