//! Metrics over windowed events.
//!
//! Every function here is a pure computation over in-memory events. Ratios
//! guard against zero counts and zero-length windows by reporting zero.

pub mod destinations;
pub mod rate;
pub mod sort_outcome;

pub use destinations::{BarcodeCount, DestinationCount, DestinationMetrics, destination_metrics};
pub use rate::{RateAnalysis, RateRow, analyze_induction, analyze_rate, choose_target_pph};
pub use sort_outcome::{
    DefectRow, ReasonCount, ReasonDestinationCount, ReasonDestinationPivot, ScanDefectRow,
    ScannerMetrics, SortCodeMetrics, SortSummary, defect_metrics, is_recirculation_event,
    jackpot_packages, processed_package_events, recirculating_packages, scan_defect_events,
    scanner_metrics, sort_code_metrics, sort_summary,
};
