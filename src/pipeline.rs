//! Synchronous analysis stages.
//!
//! `prepare_family` turns raw records into the clean table of one message
//! family. The `analyze_*` functions take typed events plus a resolved
//! window and compute everything a report needs. Nothing here touches the
//! filesystem or prompts; the processor wires these stages together.

use crate::config::AnalysisConfig;
use crate::correction::{CorrectionReport, ExceptionEntry, apply_corrections};
use crate::decoder::decode_record;
use crate::enrichment::enrich_events;
use crate::mapping::DestinationMap;
use crate::metrics::{
    DefectRow, DestinationMetrics, RateAnalysis, ScanDefectRow, ScannerMetrics, SortCodeMetrics,
    SortSummary, analyze_rate, defect_metrics, destination_metrics, scan_defect_events,
    scanner_metrics, sort_code_metrics, sort_summary,
};
use crate::models::{
    DecodedEvent, DestinationRequestEvent, ExpansionStats, InductionEvent, PackagedEvent,
    RawRecord, SortEvent,
};
use crate::normalizer::{expand_lists, first_list_element};
use crate::packages::reconstruct_packages;
use crate::reader::{FilterStats, filter_by_message_code};
use crate::schema::{ListPolicy, MessageFamily, prune_columns};
use crate::table::EventTable;
use crate::window::{ResolvedWindow, select_window};
use tracing::info;

/// One message family, filtered, decoded, normalized and pruned
#[derive(Debug, Clone)]
pub struct PreparedTable {
    pub family: MessageFamily,
    /// Records of this family as read
    pub raw: Vec<RawRecord>,
    pub filter: FilterStats,
    pub expansion: Option<ExpansionStats>,
    pub clean: EventTable,
}

pub fn prepare_family(
    records: Vec<RawRecord>,
    family: MessageFamily,
    config: &AnalysisConfig,
) -> PreparedTable {
    let code = family.code(&config.message_codes);
    let (raw, filter) = filter_by_message_code(records, code);
    info!(
        "Filtered dataset: kept {} rows with messageCode = {}, dropped {} of {} total rows",
        filter.kept,
        code,
        filter.dropped(),
        filter.total
    );

    let decoded: Vec<DecodedEvent> = raw.iter().cloned().map(decode_record).collect();
    let table = EventTable::from_decoded(&decoded);

    let (table, expansion) = match family.list_policy() {
        ListPolicy::Explode => {
            let (expanded, stats) = expand_lists(&table, &family.list_fields());
            info!(
                "Expanded {} rows into {}, dropped {} padding rows",
                stats.input_rows, stats.expanded_rows, stats.sentinel_dropped
            );
            (expanded, Some(stats))
        }
        ListPolicy::FirstElement => (first_list_element(&table, &family.list_field_names()), None),
        ListPolicy::None => (table, None),
    };

    PreparedTable {
        family,
        raw,
        filter,
        expansion,
        clean: prune_columns(&table, family),
    }
}

/// Sort-outcome analysis over one window
#[derive(Debug, Clone)]
pub struct SortAnalysis {
    pub window: ResolvedWindow,
    /// Enriched window events with their package ids, grouped by package
    pub events: Vec<PackagedEvent>,
    pub correction: Option<CorrectionReport>,
    pub scanner: ScannerMetrics,
    pub sort_codes: SortCodeMetrics,
    pub defects: Vec<DefectRow>,
    pub scan_defects: Vec<ScanDefectRow>,
    pub summary: SortSummary,
}

pub fn analyze_sort(
    events: &[SortEvent],
    window: ResolvedWindow,
    mapping: &DestinationMap,
    exceptions: Option<&[ExceptionEntry]>,
    config: &AnalysisConfig,
) -> SortAnalysis {
    let selected = select_window(events, &window);
    info!("Window holds {} sort events", selected.len());

    let mut enriched = enrich_events(selected, mapping);
    let correction = exceptions
        .map(|entries| apply_corrections(&mut enriched, entries, &config.scan_defect_codes));

    let packaged = reconstruct_packages(enriched, config.package_gap_secs);
    let rule = &config.recirculation;

    let scanner = scanner_metrics(&packaged);
    let sort_codes = sort_code_metrics(&packaged, rule);
    let defects = defect_metrics(&packaged, rule);
    let scan_defects = scan_defect_events(&packaged, &config.scan_defect_codes);
    let summary = sort_summary(&packaged, &scanner, &sort_codes);

    SortAnalysis {
        window,
        events: packaged,
        correction,
        scanner,
        sort_codes,
        defects,
        scan_defects,
        summary,
    }
}

/// Items-inducted analysis over one window
#[derive(Debug, Clone)]
pub struct RateWindowAnalysis {
    pub window: ResolvedWindow,
    pub events: Vec<InductionEvent>,
    /// `None` when no target applied to the inductions present
    pub rate: Option<RateAnalysis>,
}

pub fn analyze_induction_rate(
    events: &[InductionEvent],
    window: ResolvedWindow,
    config: &AnalysisConfig,
) -> RateWindowAnalysis {
    let selected = select_window(events, &window);
    info!("Window holds {} inducted items", selected.len());
    let rate = analyze_rate(&selected, &window, &config.rate);

    RateWindowAnalysis {
        window,
        events: selected,
        rate,
    }
}

/// Destination-request analysis over one window
#[derive(Debug, Clone)]
pub struct DestinationAnalysis {
    pub window: ResolvedWindow,
    pub metrics: DestinationMetrics,
}

pub fn analyze_destinations(
    events: &[DestinationRequestEvent],
    window: ResolvedWindow,
) -> DestinationAnalysis {
    let selected = select_window(events, &window);
    info!("Window holds {} destination requests", selected.len());

    DestinationAnalysis {
        window,
        metrics: destination_metrics(&selected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{DatasetBounds, WindowRequest, resolve_window};

    fn record(code: &str, timestamp: &str, payload: &str) -> RawRecord {
        RawRecord {
            timestamp: timestamp.to_string(),
            message_code: code.to_string(),
            payload: payload.to_string(),
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_prepare_sort_family_explodes_and_prunes() {
        let records = vec![
            record(
                "54177",
                "250924100000000",
                "->{itemID:A1,indexNo:0012,barcodeAWCS:B1,requestedDestMCID:[3001,1001],sortCode:[0,0],event:x}<",
            ),
            record("54123", "250924100001000", "->{itemID:A2,inductionNo:0}<"),
        ];
        let prepared = prepare_family(records, MessageFamily::SortOutcome, &AnalysisConfig::default());

        assert_eq!(prepared.filter.kept, 1);
        assert_eq!(prepared.filter.dropped(), 1);
        assert_eq!(prepared.clean.len(), 2);
        assert!(prepared.clean.column_index("event").is_none());
        assert_eq!(prepared.expansion.map(|s| s.expanded_rows), Some(2));
    }

    #[test]
    fn test_sort_analysis_with_empty_window_reports_zeros() {
        let records = vec![record(
            "54177",
            "250924100000000",
            "->{itemID:A1,indexNo:0012,barcodeAWCS:B1,requestedDestMCID:[1001],sortCode:[9]}<",
        )];
        let config = AnalysisConfig::default();
        let prepared = prepare_family(records, MessageFamily::SortOutcome, &config);
        let events = prepared.clean.to_sort_events();

        let bounds = DatasetBounds::from_events(&events).unwrap();
        let request = WindowRequest::Range {
            start: Some("11:00".to_string()),
            end: None,
        };
        let window = resolve_window(&bounds, &request, config.window_minutes).unwrap();
        assert!(window.empty);

        let analysis = analyze_sort(&events, window, &DestinationMap::default(), None, &config);
        assert!(analysis.events.is_empty());
        assert_eq!(analysis.scanner.total, 0);
        assert_eq!(analysis.summary.window_events, 0);
        assert!(analysis.defects.iter().all(|row| row.percentage == 0.0));
    }
}
