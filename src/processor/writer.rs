//! Report export
//!
//! Writes every table of an `AnalysisReport` (plus its summary) as one flat
//! file named `<prefix>_<start>_<end>_<table>.<ext>`.

use crate::config::{ExportConfig, ExportFormat};
use crate::error::{Result, SorterError};
use crate::report::AnalysisReport;

use polars::prelude::{CsvWriter, DataFrame, ParquetCompression, ParquetWriter, SerWriter};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

/// Flat-table writer for analysis reports
#[derive(Debug, Clone)]
pub struct ReportWriter {
    directory: PathBuf,
    format: ExportFormat,
    separator: u8,
}

impl ReportWriter {
    pub fn new(directory: PathBuf, format: ExportFormat) -> Self {
        Self {
            directory,
            format,
            separator: b';',
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.directory.clone(), config.format)
            .with_separator(config.csv_separator)
    }

    /// CSV field separator; non-ASCII characters fall back to `;`
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = u8::try_from(separator)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(b';');
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File stem shared by every table of a report
    pub fn file_stem(report: &AnalysisReport) -> String {
        match &report.window {
            Some(window) => format!(
                "{}_{}_{}",
                report.prefix,
                window.start.format(FILE_TIMESTAMP),
                window.end.format(FILE_TIMESTAMP)
            ),
            None => report.prefix.clone(),
        }
    }

    /// Write all tables and the summary; returns the paths written
    pub fn write_report(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.directory)?;
        let stem = Self::file_stem(report);

        let mut written = Vec::with_capacity(report.tables.len() + 1);
        for table in &report.tables {
            let path = self.table_path(&stem, &table.name);
            self.write_frame(table.frame.clone(), &path)?;
            written.push(path);
        }

        if !report.summary.is_empty() {
            let path = self.table_path(&stem, "summary");
            self.write_frame(report.summary_frame()?, &path)?;
            written.push(path);
        }

        debug!(
            "Wrote {} tables to {}",
            written.len(),
            self.directory.display()
        );
        Ok(written)
    }

    fn table_path(&self, stem: &str, table: &str) -> PathBuf {
        self.directory
            .join(format!("{}_{}.{}", stem, table, self.format.extension()))
    }

    fn write_frame(&self, mut frame: DataFrame, path: &Path) -> Result<()> {
        let export_failed = |reason: String| SorterError::ExportFailed {
            path: path.to_path_buf(),
            reason,
        };
        let mut file = File::create(path)?;

        match self.format {
            ExportFormat::Csv => CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(self.separator)
                .finish(&mut frame)
                .map_err(|e| export_failed(format!("Failed to write CSV: {}", e))),
            ExportFormat::Parquet => ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut frame)
                .map(|_| ())
                .map_err(|e| export_failed(format!("Failed to write parquet: {}", e))),
        }
    }
}
