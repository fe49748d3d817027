//! Named result tables.
//!
//! Every analysis ends as an `AnalysisReport`: a list of polars DataFrames
//! keyed by table name plus ordered metric/value summary pairs. The writer
//! and the terminal summaries only ever see this shape.

use crate::alarms::{CategoryCount, DurationReport, JamCount, format_hhmmss};
use crate::error::Result;
use crate::metrics::RateRow;
use crate::metrics::sort_outcome::ReasonDestinationPivot;
use crate::models::{InductionEvent, PackagedEvent, RawRecord};
use crate::pipeline::{DestinationAnalysis, PreparedTable, RateWindowAnalysis, SortAnalysis};
use crate::window::ResolvedWindow;
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashSet;

const DISPLAY_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.3f";
const PIVOT_KEY_COLUMN: &str = "sortReason";

#[derive(Debug, Clone)]
pub struct NamedTable {
    pub name: String,
    pub frame: DataFrame,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// File name prefix for exports
    pub prefix: String,
    /// Analysis window; alarm summaries have none
    pub window: Option<ResolvedWindow>,
    pub tables: Vec<NamedTable>,
    pub summary: Vec<(String, String)>,
}

impl AnalysisReport {
    fn new(prefix: &str, window: Option<ResolvedWindow>) -> Self {
        Self {
            prefix: prefix.to_string(),
            window,
            tables: Vec::new(),
            summary: Vec::new(),
        }
    }

    fn push_table(&mut self, name: &str, frame: DataFrame) {
        self.tables.push(NamedTable {
            name: name.to_string(),
            frame,
        });
    }

    fn push_summary(&mut self, metric: &str, value: impl ToString) {
        self.summary.push((metric.to_string(), value.to_string()));
    }

    pub fn table(&self, name: &str) -> Option<&DataFrame> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .map(|table| &table.frame)
    }

    pub fn summary_value(&self, metric: &str) -> Option<&str> {
        self.summary
            .iter()
            .find(|(name, _)| name == metric)
            .map(|(_, value)| value.as_str())
    }

    /// Summary pairs as a two-column frame
    pub fn summary_frame(&self) -> PolarsResult<DataFrame> {
        let (metrics, values): (Vec<String>, Vec<String>) = self.summary.iter().cloned().unzip();
        DataFrame::new(vec![
            Column::new("metric".into(), metrics),
            Column::new("value".into(), values),
        ])
    }
}

fn format_timestamp(timestamp: Option<NaiveDateTime>) -> Option<String> {
    timestamp.map(|ts| ts.format(DISPLAY_TIMESTAMP).to_string())
}

fn text_column<T>(name: &str, rows: &[T], value: impl Fn(&T) -> Option<String>) -> Column {
    let values: Vec<Option<String>> = rows.iter().map(value).collect();
    Column::new(name.into(), values)
}

/// Reason rows by destination columns; destination names that clash with
/// an existing column get a `_dest` suffix (numbered if still taken)
fn pivot_frame(pivot: &ReasonDestinationPivot) -> PolarsResult<DataFrame> {
    let mut used: HashSet<String> = HashSet::from([PIVOT_KEY_COLUMN.to_string()]);
    let mut columns = vec![text_column(PIVOT_KEY_COLUMN, &pivot.rows, |(reason, _)| {
        Some(reason.clone())
    })];

    for (position, destination) in pivot.destinations.iter().enumerate() {
        let mut name = destination.clone();
        let mut suffix = 1;
        while used.contains(&name) {
            name = if suffix == 1 {
                format!("{}_dest", destination)
            } else {
                format!("{}_dest{}", destination, suffix)
            };
            suffix += 1;
        }
        used.insert(name.clone());

        columns.push(int_column(&name, &pivot.rows, |(_, counts)| {
            counts.get(position).map(|count| *count as i64)
        }));
    }

    DataFrame::new(columns)
}

fn int_column<T>(name: &str, rows: &[T], value: impl Fn(&T) -> Option<i64>) -> Column {
    let values: Vec<Option<i64>> = rows.iter().map(value).collect();
    Column::new(name.into(), values)
}

fn float_column<T>(name: &str, rows: &[T], value: impl Fn(&T) -> Option<f64>) -> Column {
    let values: Vec<Option<f64>> = rows.iter().map(value).collect();
    Column::new(name.into(), values)
}

fn push_window_summary(report: &mut AnalysisReport, window: &ResolvedWindow) {
    report.push_summary("window_start", window.start.format(DISPLAY_TIMESTAMP));
    report.push_summary("window_end", window.end.format(DISPLAY_TIMESTAMP));
    report.push_summary("window_minutes", format!("{:.2}", window.duration_minutes()));
    report.push_summary("window_empty", window.empty);
}

/// All twelve raw fields, as read
pub fn raw_records_frame(records: &[RawRecord]) -> PolarsResult<DataFrame> {
    let columns = crate::constants::RAW_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, name)| {
            text_column(name, records, |record| {
                record.all_fields().get(index).map(|field| field.to_string())
            })
        })
        .collect();
    DataFrame::new(columns)
}

fn packaged_events_frame(events: &[PackagedEvent]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        text_column("timeStamp", events, |p| format_timestamp(p.event.timestamp)),
        text_column("plcRecordNo", events, |p| p.event.plc_record_no.clone()),
        text_column("itemID", events, |p| p.event.item_id.clone()),
        text_column("indexNo", events, |p| p.event.index_no.clone()),
        text_column("locationAWCS", events, |p| p.event.location.clone()),
        text_column("barcodeAWCS", events, |p| p.event.barcode.clone()),
        int_column("actualDestMCID", events, |p| p.event.actual_destination),
        int_column("requestedDestMCID", events, |p| p.event.requested_destination),
        int_column("sortCode", events, |p| p.event.sort_code),
        text_column("sortReason", events, |p| {
            p.event.sort_reason.map(|r| r.label().to_string())
        }),
        text_column("defectCategory", events, |p| {
            p.event.defect_category.map(|c| c.label().to_string())
        }),
        text_column("Amazon", events, |p| p.event.amazon_destination.clone()),
        text_column("Beumer", events, |p| p.event.beumer_destination.clone()),
        text_column("Jackpot", events, |p| p.event.jackpot_destination.clone()),
        text_column("explanation", events, |p| p.event.explanation.clone()),
        text_column("packageID", events, |p| Some(p.package_id.clone())),
        text_column("classification", events, |p| {
            Some(p.classification.label().to_string())
        }),
    ])
}

fn push_prepared_tables(report: &mut AnalysisReport, prepared: &PreparedTable) -> Result<()> {
    report.push_table("raw_data", raw_records_frame(&prepared.raw)?);
    report.push_table("clean_data", prepared.clean.to_dataframe()?);
    Ok(())
}

pub fn sort_report(prepared: &PreparedTable, analysis: &SortAnalysis) -> Result<AnalysisReport> {
    let mut report = AnalysisReport::new("sort", Some(analysis.window.clone()));
    push_prepared_tables(&mut report, prepared)?;
    report.push_table("window_data", packaged_events_frame(&analysis.events)?);

    let scanner = &analysis.scanner;
    report.push_table(
        "scanner",
        DataFrame::new(vec![
            Column::new(
                "classification".into(),
                vec!["total", "normal", "no_read", "multi_read"],
            ),
            Column::new(
                "packages".into(),
                [scanner.total, scanner.normal, scanner.no_read, scanner.multi_read]
                    .map(|count| count as i64)
                    .to_vec(),
            ),
        ])?,
    );

    let counts = &analysis.sort_codes.sort_counts;
    report.push_table(
        "sort_codes",
        DataFrame::new(vec![
            text_column("sortReason", counts, |row| Some(row.reason.clone())),
            int_column("count", counts, |row| Some(row.count as i64)),
        ])?,
    );

    let pairs = &analysis.sort_codes.reason_destinations;
    report.push_table(
        "reason_destination",
        DataFrame::new(vec![
            text_column("sortReason", pairs, |row| Some(row.reason.clone())),
            text_column("Amazon", pairs, |row| Some(row.destination.clone())),
            int_column("count", pairs, |row| Some(row.count as i64)),
        ])?,
    );

    report.push_table(
        "reason_destination_pivot",
        pivot_frame(&analysis.sort_codes.pivot)?,
    );

    let defects = &analysis.defects;
    report.push_table(
        "defects",
        DataFrame::new(vec![
            text_column("defectCategory", defects, |row| Some(row.category.clone())),
            int_column("count", defects, |row| Some(row.count as i64)),
            float_column("percentage", defects, |row| Some(row.percentage)),
        ])?,
    );

    let scan_defects = &analysis.scan_defects;
    report.push_table(
        "scan_defects",
        DataFrame::new(vec![
            text_column("indexNo", scan_defects, |row| row.index_no.clone()),
            text_column("timeStamp", scan_defects, |row| format_timestamp(row.timestamp)),
            int_column("sortCode", scan_defects, |row| Some(row.sort_code)),
        ])?,
    );

    push_window_summary(&mut report, &analysis.window);
    let summary = &analysis.summary;
    report.push_summary("S04_processed", summary.window_events);
    report.push_summary("packages_processed", summary.packages_processed);
    report.push_summary("unique_packages", summary.unique_packages);
    report.push_summary(
        "processed_after_recirculation",
        analysis.sort_codes.processed_packages,
    );
    report.push_summary("recirculation_packages", summary.recirculation_packages);
    report.push_summary("recirculation_records", summary.recirculation_records);
    report.push_summary("jackpot_packages", summary.jackpot_packages);
    if let Some(correction) = &analysis.correction {
        report.push_summary("corrected_scan_defects", correction.corrected);
        report.push_summary("corrections_not_applied", correction.not_applied.join(","));
        report.push_summary("invalid_exception_ids", correction.invalid_ids.join(","));
    }

    Ok(report)
}

fn induction_events_frame(events: &[InductionEvent]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        text_column("timeStamp", events, |e| format_timestamp(e.timestamp)),
        text_column("itemID", events, |e| e.item_id.clone()),
        text_column("indexNo", events, |e| e.index_no.clone()),
        text_column("inductionNo", events, |e| e.induction_no.clone()),
        text_column("induction", events, |e| Some(e.induction.clone())),
    ])
}

fn rate_frame(rows: &[RateRow]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        text_column("line_name", rows, |r| Some(r.line_name.clone())),
        text_column("measuring_point", rows, |r| r.measuring_point.clone()),
        text_column("time_label", rows, |r| r.time_label.clone()),
        int_column("n_items", rows, |r| Some(r.n_items as i64)),
        float_column("window_minutes", rows, |r| r.window_minutes),
        float_column("items_per_sec", rows, |r| r.items_per_sec),
        float_column("items_per_min", rows, |r| r.items_per_min),
        float_column("pph", rows, |r| Some(r.pph)),
        float_column("target_pph", rows, |r| Some(r.target_pph)),
        float_column("attainment_pct", rows, |r| Some(r.attainment_pct)),
        int_column("needed_items_for_pass", rows, |r| r.needed_items_for_pass),
        int_column("items_short", rows, |r| r.items_short),
        float_column("sec_per_bag_current", rows, |r| r.sec_per_bag_current),
        float_column("sec_per_bag_target", rows, |r| r.sec_per_bag_target),
        text_column("recommendation", rows, |r| r.recommendation.clone()),
        text_column("summary_line", rows, |r| r.summary_line.clone()),
        text_column("passed", rows, |r| r.passed.map(|p| p.to_string())),
    ])
}

pub fn rate_report(
    prepared: &PreparedTable,
    analysis: &RateWindowAnalysis,
) -> Result<AnalysisReport> {
    let mut report = AnalysisReport::new("rate", Some(analysis.window.clone()));
    push_prepared_tables(&mut report, prepared)?;
    report.push_table("window_data", induction_events_frame(&analysis.events)?);

    push_window_summary(&mut report, &analysis.window);
    report.push_summary("items_inducted", analysis.events.len());

    match &analysis.rate {
        Some(rate) => {
            report.push_table("rate", rate_frame(&rate.rows)?);
            report.push_summary("target_pph", format!("{:.2}", rate.target_pph));
            report.push_summary("inductions", rate.inductions.join(","));
            if let Some(total) = rate.total() {
                report.push_summary("total_pph", format!("{:.2}", total.pph));
                report.push_summary("total_attainment_pct", format!("{:.2}", total.attainment_pct));
            }
        }
        None => report.push_summary("rate_analysis", "skipped: no target PPH"),
    }

    Ok(report)
}

pub fn destination_report(
    prepared: &PreparedTable,
    analysis: &DestinationAnalysis,
) -> Result<AnalysisReport> {
    let mut report = AnalysisReport::new("destinations", Some(analysis.window.clone()));
    push_prepared_tables(&mut report, prepared)?;

    let metrics = &analysis.metrics;
    let unique = &metrics.unique_requests;
    report.push_table(
        "window_data",
        DataFrame::new(vec![
            text_column("timeStamp", unique, |e| format_timestamp(e.timestamp)),
            text_column("itemID", unique, |e| e.item_id.clone()),
            text_column("barcodeAWCS", unique, |e| e.barcode.clone()),
            text_column("requestedDestMCID", unique, |e| e.requested_destination.clone()),
            int_column("sortCode", unique, |e| e.sort_code),
        ])?,
    );

    let counts = &metrics.destination_counts;
    report.push_table(
        "destination_counts",
        DataFrame::new(vec![
            text_column("requestedDestMCID", counts, |row| Some(row.destination.clone())),
            int_column("Count", counts, |row| Some(row.count as i64)),
        ])?,
    );

    let repeated = &metrics.repeated_barcodes;
    report.push_table(
        "repeated_barcodes",
        DataFrame::new(vec![
            text_column("BarcodeAWCS", repeated, |row| Some(row.barcode.clone())),
            int_column("Count", repeated, |row| Some(row.count as i64)),
        ])?,
    );

    push_window_summary(&mut report, &analysis.window);
    report.push_summary("total_processed", metrics.total_processed);
    report.push_summary("unique_packages", metrics.unique_packages);

    Ok(report)
}

pub fn duration_alarm_report(alarms: &DurationReport) -> Result<AnalysisReport> {
    let kind = alarms.kind;
    let mut report = AnalysisReport::new(kind.table_name(), None);
    let rows = &alarms.rows;

    let mut columns = vec![text_column(kind.label(), rows, |row| Some(row.device.clone()))];
    if kind == crate::alarms::DeviceKind::Chute {
        columns.push(text_column("Amazon", rows, |row| row.amazon.clone()));
    }
    columns.extend([
        int_column(kind.count_label(), rows, |row| Some(row.count as i64)),
        text_column("Total Duration", rows, |row| Some(format_hhmmss(row.total))),
        text_column("Average Duration", rows, |row| Some(format_hhmmss(row.average))),
        text_column("Max Duration", rows, |row| Some(format_hhmmss(row.max))),
    ]);
    report.push_table(kind.table_name(), DataFrame::new(columns)?);

    report.push_summary("devices", rows.len());
    report.push_summary("alarms", rows.iter().map(|row| row.count).sum::<usize>());
    report.push_summary("dropped_rows", alarms.dropped_rows);
    Ok(report)
}

pub fn jam_report(jams: &[JamCount]) -> Result<AnalysisReport> {
    let mut report = AnalysisReport::new("jam_occurrences", None);
    report.push_table(
        "jam_occurrences",
        DataFrame::new(vec![
            text_column("Amazon_Part", jams, |row| Some(row.chute.clone())),
            int_column("total_jams", jams, |row| Some(row.total_jams)),
        ])?,
    );
    report.push_summary("chutes", jams.len());
    report.push_summary("jams", jams.iter().map(|row| row.total_jams).sum::<i64>());
    Ok(report)
}

pub fn category_report(categories: &[CategoryCount]) -> Result<AnalysisReport> {
    let mut report = AnalysisReport::new("alarm_categories", None);
    report.push_table(
        "alarm_categories",
        DataFrame::new(vec![
            text_column("Text", categories, |row| Some(row.text.clone())),
            int_column("total_amount", categories, |row| Some(row.total_amount)),
        ])?,
    );
    report.push_summary("categories", categories.len());
    Ok(report)
}
