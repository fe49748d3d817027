//! Failure modes of a processing run

use super::*;
use crate::config::AnalysisConfig;
use crate::error::SorterError;
use crate::processor::{AnalysisKind, LogProcessor, MappingSource, PresetChoices};
use crate::window::WindowRequest;
use std::fs;
use tempfile::TempDir;

fn full_window() -> PresetChoices {
    PresetChoices {
        window: WindowRequest::Full,
        exceptions: None,
    }
}

#[test]
fn test_nonexistent_input() {
    let result = LogProcessor::new(vec![PathBuf::from("/nonexistent/sorter.log")]);

    match result.unwrap_err() {
        SorterError::InputNotFound { path } => {
            assert_eq!(path, PathBuf::from("/nonexistent/sorter.log"));
        }
        _ => panic!("Expected InputNotFound error"),
    }
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let temp_dir = TempDir::new().unwrap();
    let workbook = temp_dir.path().join("export.xlsx");
    fs::write(&workbook, "not really a workbook").unwrap();

    let mut processor = LogProcessor::new(vec![workbook]).unwrap().without_export();
    let result = processor
        .process(AnalysisKind::Rate, &mut full_window())
        .await;

    match result.unwrap_err() {
        SorterError::UnsupportedFileType { extension, .. } => assert_eq!(extension, "xlsx"),
        _ => panic!("Expected UnsupportedFileType error"),
    }
}

#[tokio::test]
async fn test_empty_directory() {
    let temp_dir = TempDir::new().unwrap();

    let mut processor = LogProcessor::new(vec![temp_dir.path().to_path_buf()])
        .unwrap()
        .without_export();
    let result = processor
        .process(AnalysisKind::Destinations, &mut full_window())
        .await;

    assert!(matches!(result, Err(SorterError::NoInputFiles { .. })));
}

#[tokio::test]
async fn test_unparseable_timestamps_fail_without_export() {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("broken.log");
    fs::write(
        &log,
        [
            log_line("yesterday", "54123", "itemID:I1,inductionNo:0"),
            log_line("", "54123", "itemID:I2,inductionNo:0"),
        ]
        .concat(),
    )
    .unwrap();
    let output = temp_dir.path().join("reports");

    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(AnalysisConfig::default().with_export_dir(output.clone()));
    let result = processor
        .process(AnalysisKind::Rate, &mut full_window())
        .await;

    match result.unwrap_err() {
        SorterError::EmptyDataset { reason } => assert!(reason.contains("timestamps")),
        _ => panic!("Expected EmptyDataset error"),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_family_absent_from_logs() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_sort_log(temp_dir.path());

    let mut processor = LogProcessor::new(vec![log]).unwrap().without_export();
    let result = processor
        .process(AnalysisKind::Destinations, &mut full_window())
        .await;

    assert!(matches!(result, Err(SorterError::EmptyDataset { .. })));
}

#[tokio::test]
async fn test_invalid_time_input() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_induction_log(temp_dir.path());
    let output = temp_dir.path().join("reports");

    let mut choices = PresetChoices {
        window: WindowRequest::Range {
            start: Some("25:99".to_string()),
            end: None,
        },
        exceptions: None,
    };
    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(AnalysisConfig::default().with_export_dir(output.clone()));
    let result = processor.process(AnalysisKind::Rate, &mut choices).await;

    match result.unwrap_err() {
        SorterError::InvalidTimeInput { input, .. } => assert_eq!(input, "25:99"),
        _ => panic!("Expected InvalidTimeInput error"),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_missing_site_mapping() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_sort_log(temp_dir.path());

    let config = AnalysisConfig::default().with_mapping_dir(temp_dir.path().to_path_buf());
    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(config)
        .with_mapping(MappingSource::Site("xyz1".to_string()))
        .without_export();
    let result = processor
        .process(AnalysisKind::Sort, &mut full_window())
        .await;

    match result.unwrap_err() {
        SorterError::InputNotFound { path } => {
            assert_eq!(
                path,
                temp_dir.path().join("XYZ1_Destination_Mapping.csv")
            );
        }
        _ => panic!("Expected InputNotFound error"),
    }
}

#[tokio::test]
async fn test_missing_exception_list() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_sort_log(temp_dir.path());
    let mapping = write_mapping(temp_dir.path());

    let mut choices = PresetChoices {
        window: WindowRequest::Full,
        exceptions: Some(temp_dir.path().join("missing.csv")),
    };
    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_mapping(MappingSource::File(mapping))
        .without_export();
    let result = processor.process(AnalysisKind::Sort, &mut choices).await;

    assert!(matches!(result, Err(SorterError::InputNotFound { .. })));
}

#[tokio::test]
async fn test_mapping_without_required_columns() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_sort_log(temp_dir.path());
    let mapping = temp_dir.path().join("bad_mapping.csv");
    fs::write(&mapping, "Destination,Name\n1001,ARSC-1\n").unwrap();

    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_mapping(MappingSource::File(mapping.clone()))
        .without_export();
    let result = processor
        .process(AnalysisKind::Sort, &mut full_window())
        .await;

    match result.unwrap_err() {
        SorterError::MappingLoad { path, reason } => {
            assert_eq!(path, mapping);
            assert!(reason.contains("IndexNo"));
        }
        _ => panic!("Expected MappingLoad error"),
    }
}
