//! Input discovery for log exports
//!
//! Inputs are files or directories. Files are taken as given (after an
//! extension check); directories are walked recursively and every log
//! export inside is taken in sorted path order.

use crate::constants::SUPPORTED_LOG_EXTENSIONS;
use crate::error::{Result, SorterError};
use crate::reader::ensure_supported_extension;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Resolves user inputs into the list of log files to read
#[derive(Debug)]
pub struct FileDiscovery {
    inputs: Vec<PathBuf>,
    directory_count: usize,
}

impl FileDiscovery {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            directory_count: 0,
        }
    }

    /// Number of directory inputs walked by the last discovery
    pub fn directory_count(&self) -> usize {
        self.directory_count
    }

    /// Expand inputs into files, keeping input order
    pub fn discover_log_files(&mut self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.directory_count = 0;

        for input in &self.inputs {
            if !input.exists() {
                return Err(SorterError::InputNotFound {
                    path: input.clone(),
                });
            }

            if input.is_dir() {
                self.directory_count += 1;
                let found = walk_directory(input)?;
                if found.is_empty() {
                    return Err(SorterError::NoInputFiles {
                        path: input.clone(),
                    });
                }
                debug!("Found {} log files under {}", found.len(), input.display());
                files.extend(found);
            } else {
                ensure_supported_extension(input)?;
                files.push(input.clone());
            }
        }

        Ok(files)
    }
}

fn walk_directory(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_log_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Case-insensitive match on the supported log extensions
fn is_log_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_LOG_EXTENSIONS.contains(&ext.as_str()))
}
