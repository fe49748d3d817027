//! Concurrent log loading
//!
//! Files are parsed on blocking worker tasks with bounded concurrency and
//! their records concatenated in input order, whatever order the reads
//! finish in.

use crate::error::{Result, SorterError};
use crate::models::{RawRecord, ReadStats};
use crate::reader::read_log_file;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::task;
use tracing::{debug, info};

/// Records and line statistics from all input files
#[derive(Debug, Clone, Default)]
pub struct LoadedLogs {
    pub records: Vec<RawRecord>,
    pub stats: ReadStats,
    pub files_read: usize,
}

#[derive(Debug, Clone)]
pub struct LogLoader {
    concurrency: usize,
}

impl LogLoader {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub async fn load(&self, files: &[PathBuf]) -> Result<LoadedLogs> {
        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        if files.len() < 2 {
            progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }

        let limit = self.concurrency.min(files.len()).max(1);
        debug!("Loading {} files with concurrency {}", files.len(), limit);

        let mut results = stream::iter(files.iter().cloned().enumerate())
            .map(|(index, path)| {
                let progress = progress.clone();
                async move {
                    if let Some(name) = path.file_name() {
                        progress.set_message(format!("Reading: {}", name.to_string_lossy()));
                    }
                    let result = task::spawn_blocking(move || read_log_file(&path))
                        .await
                        .map_err(|e| SorterError::Io(std::io::Error::other(e.to_string())));
                    progress.inc(1);
                    (index, result)
                }
            })
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await;
        progress.finish_and_clear();

        results.sort_by_key(|(index, _)| *index);

        let mut loaded = LoadedLogs::default();
        for (_, result) in results {
            let (records, stats) = result??;
            loaded.records.extend(records);
            loaded.stats.merge(&stats);
            loaded.files_read += 1;
        }

        info!(
            "Read {} records from {} files ({} malformed lines dropped)",
            loaded.records.len(),
            loaded.files_read,
            loaded.stats.malformed_lines
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn line(timestamp: &str, item: &str) -> String {
        format!(
            "{};F;SYS;10.0.0.1;PLC;u;u;{};CAB;54177;1;->{{itemID:{}}}<\n",
            timestamp, timestamp, item
        )
    }

    #[tokio::test]
    async fn test_records_concatenate_in_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for (index, item) in ["first", "second", "third"].iter().enumerate() {
            let path = temp_dir.path().join(format!("{}.log", 9 - index));
            fs::write(&path, line("250924100000000", item)).unwrap();
            files.push(path);
        }

        let loaded = LogLoader::new(3).load(&files).await.unwrap();
        assert_eq!(loaded.files_read, 3);
        let payloads: Vec<&str> = loaded.records.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(
            payloads,
            vec!["->{itemID:first}<", "->{itemID:second}<", "->{itemID:third}<"]
        );
    }

    #[tokio::test]
    async fn test_malformed_lines_are_counted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mixed.csv");
        let contents = format!("{}too;few;fields\n\n", line("250924100000000", "A1"));
        fs::write(&path, contents).unwrap();

        let loaded = LogLoader::new(1).load(&[path]).await.unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.stats.malformed_lines, 1);
        assert_eq!(loaded.stats.blank_lines, 1);
    }

    #[tokio::test]
    async fn test_empty_file_list() {
        let loaded = LogLoader::new(4).load(&[]).await.unwrap();
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.files_read, 0);
    }
}
