//! End-to-end runs of each analysis kind

use super::*;
use crate::config::AnalysisConfig;
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

fn exported_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_sort_pipeline_exports_all_tables() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_sort_log(temp_dir.path());
    let mapping = write_mapping(temp_dir.path());
    let output = temp_dir.path().join("reports");

    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(AnalysisConfig::default().with_export_dir(output.clone()))
        .with_mapping(MappingSource::File(mapping));

    let outcome = processor
        .process(AnalysisKind::Sort, &mut full_window())
        .await
        .unwrap();

    assert_eq!(outcome.stats.files_read, 1);
    assert_eq!(outcome.stats.records_read, 5);
    assert_eq!(outcome.stats.family_records, 4);
    assert_eq!(outcome.stats.clean_rows, 5);

    let report = &outcome.report;
    assert_eq!(report.summary_value("S04_processed"), Some("5"));
    assert_eq!(report.summary_value("packages_processed"), Some("3"));
    assert_eq!(report.summary_value("processed_after_recirculation"), Some("3"));
    assert_eq!(report.summary_value("recirculation_packages"), Some("1"));
    assert_eq!(report.summary_value("recirculation_records"), Some("4"));
    assert_eq!(report.summary_value("jackpot_packages"), Some("1"));
    assert_eq!(report.summary_value("corrected_scan_defects"), None);

    // every table plus the summary lands in the export directory
    assert_eq!(outcome.stats.written.len(), report.tables.len() + 1);
    let names = exported_names(&output);
    assert_eq!(names.len(), report.tables.len() + 1);
    assert!(names.iter().all(|name| name.starts_with("sort_20250924-100000_")));
    assert!(names.iter().any(|name| name.ends_with("_scan_defects.csv")));
    assert!(names.iter().any(|name| name.ends_with("_summary.csv")));

    let scan_defects = report.table("scan_defects").unwrap();
    assert_eq!(scan_defects.height(), 1);
}

#[tokio::test]
async fn test_sort_pipeline_with_exception_list() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_sort_log(temp_dir.path());
    let mapping = write_mapping(temp_dir.path());
    let exceptions = temp_dir.path().join("exceptions.csv");
    fs::write(&exceptions, "ID,Comment\n34,label was fine\n77,not in window\n").unwrap();

    let mut choices = PresetChoices {
        window: WindowRequest::Full,
        exceptions: Some(exceptions),
    };
    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_mapping(MappingSource::File(mapping))
        .without_export();

    let outcome = processor
        .process(AnalysisKind::Sort, &mut choices)
        .await
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.summary_value("corrected_scan_defects"), Some("1"));
    assert_eq!(report.summary_value("corrections_not_applied"), Some("0077"));
    assert_eq!(report.table("scan_defects").unwrap().height(), 0);
    assert!(outcome.stats.written.is_empty());
}

#[tokio::test]
async fn test_sort_pipeline_site_mapping_and_range_window() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_sort_log(temp_dir.path());
    write_mapping(temp_dir.path());

    let config = AnalysisConfig::default().with_mapping_dir(temp_dir.path().to_path_buf());
    let mut choices = PresetChoices {
        window: WindowRequest::Range {
            start: Some("10:05".to_string()),
            end: Some("10:12".to_string()),
        },
        exceptions: None,
    };
    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(config)
        .with_mapping(MappingSource::Site("tst1".to_string()))
        .without_export();

    let outcome = processor
        .process(AnalysisKind::Sort, &mut choices)
        .await
        .unwrap();

    // only the second A1 event and the B1 no-read fall inside 10:05..10:12
    let report = &outcome.report;
    assert_eq!(report.summary_value("S04_processed"), Some("2"));
    assert_eq!(report.summary_value("packages_processed"), Some("2"));
    assert_eq!(report.summary_value("recirculation_packages"), Some("0"));
    assert_eq!(report.summary_value("window_empty"), Some("false"));
}

#[tokio::test]
async fn test_rate_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_induction_log(temp_dir.path());
    let output = temp_dir.path().join("out");

    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(AnalysisConfig::default().with_export_dir(output.clone()));

    let outcome = processor
        .process(AnalysisKind::Rate, &mut full_window())
        .await
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.summary_value("items_inducted"), Some("3"));
    assert_eq!(report.summary_value("inductions"), Some("IU001"));
    assert_eq!(report.summary_value("target_pph"), Some("2640.00"));
    assert_eq!(report.summary_value("total_pph"), Some("180.00"));

    // one row for IU001 plus the total
    assert_eq!(report.table("rate").unwrap().height(), 2);
    assert!(exported_names(&output)
        .iter()
        .any(|name| name.starts_with("rate_") && name.ends_with("_rate.csv")));
}

#[tokio::test]
async fn test_rate_pipeline_window_after_data() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_induction_log(temp_dir.path());

    let mut choices = PresetChoices {
        window: WindowRequest::Range {
            start: Some("11:00".to_string()),
            end: None,
        },
        exceptions: None,
    };
    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(AnalysisConfig::default())
        .without_export();

    let outcome = processor
        .process(AnalysisKind::Rate, &mut choices)
        .await
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.summary_value("window_empty"), Some("true"));
    assert_eq!(report.summary_value("items_inducted"), Some("0"));
    assert_eq!(report.summary_value("total_pph"), Some("0.00"));
    assert_eq!(report.summary_value("total_attainment_pct"), Some("0.00"));
    assert!(report.summary_value("rate_analysis").is_none());
    assert_eq!(report.table("rate").unwrap().height(), 1);
}

#[tokio::test]
async fn test_rate_pipeline_without_sps_target() {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("sps.log");
    fs::write(
        &log,
        [
            log_line("250924100000000", "54123", "itemID:S1,inductionNo:100"),
            log_line("250924100100000", "54123", "itemID:S2,inductionNo:100"),
        ]
        .concat(),
    )
    .unwrap();

    let mut processor = LogProcessor::new(vec![log])
        .unwrap()
        .with_config(AnalysisConfig::default().with_sps_target(None))
        .without_export();

    let outcome = processor
        .process(AnalysisKind::Rate, &mut full_window())
        .await
        .unwrap();

    let report = &outcome.report;
    assert_eq!(
        report.summary_value("rate_analysis"),
        Some("skipped: no target PPH")
    );
    assert!(report.table("rate").is_none());
}

#[tokio::test]
async fn test_destination_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let log = write_destination_log(temp_dir.path());

    let mut processor = LogProcessor::new(vec![log]).unwrap().without_export();
    let outcome = processor
        .process(AnalysisKind::Destinations, &mut full_window())
        .await
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.summary_value("total_processed"), Some("2"));
    assert_eq!(report.summary_value("unique_packages"), Some("2"));

    let repeated = report.table("repeated_barcodes").unwrap();
    assert_eq!(repeated.height(), 1);
    assert_eq!(
        repeated.column("BarcodeAWCS").unwrap().str().unwrap().get(0),
        Some("X1")
    );
}

#[tokio::test]
async fn test_directory_input_reads_every_file() {
    let temp_dir = TempDir::new().unwrap();
    let logs = temp_dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    write_sort_log(&logs);
    write_induction_log(&logs);

    let mut processor = LogProcessor::new(vec![logs]).unwrap().without_export();
    let outcome = processor
        .process(AnalysisKind::Rate, &mut full_window())
        .await
        .unwrap();

    assert_eq!(outcome.stats.files_read, 2);
    assert_eq!(outcome.stats.records_read, 8);
    // the sort log contributes one induction record at 10:20
    assert_eq!(outcome.report.summary_value("items_inducted"), Some("4"));
}
