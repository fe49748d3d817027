//! Destination-request breakdown.

use crate::models::DestinationRequestEvent;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationCount {
    pub destination: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeCount {
    pub barcode: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationMetrics {
    /// Window rows after keeping the first row per barcode
    pub unique_requests: Vec<DestinationRequestEvent>,
    pub total_processed: usize,
    /// Distinct non-empty barcodes
    pub unique_packages: usize,
    /// Requested destination counts, largest first
    pub destination_counts: Vec<DestinationCount>,
    /// Barcodes requested more than once in the window, largest first
    pub repeated_barcodes: Vec<BarcodeCount>,
}

fn sorted_counts(counts: HashMap<&str, usize>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(key, count)| (key.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Breakdown over window events
///
/// Deduplication treats a missing barcode as one key, so rows without a
/// barcode collapse into the first of them.
pub fn destination_metrics(events: &[DestinationRequestEvent]) -> DestinationMetrics {
    let mut seen: HashSet<Option<&str>> = HashSet::new();
    let unique_requests: Vec<DestinationRequestEvent> = events
        .iter()
        .filter(|event| seen.insert(event.barcode.as_deref()))
        .cloned()
        .collect();

    let mut by_destination: HashMap<&str, usize> = HashMap::new();
    for event in &unique_requests {
        if let Some(destination) = event.requested_destination.as_deref() {
            *by_destination.entry(destination).or_default() += 1;
        }
    }

    let mut by_barcode: HashMap<&str, usize> = HashMap::new();
    for event in events {
        if let Some(barcode) = event.barcode.as_deref() {
            *by_barcode.entry(barcode).or_default() += 1;
        }
    }
    let repeated: HashMap<&str, usize> = by_barcode
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .collect();

    let unique_packages = unique_requests
        .iter()
        .filter_map(|event| event.barcode.as_deref())
        .collect::<BTreeSet<_>>()
        .len();

    DestinationMetrics {
        total_processed: unique_requests.len(),
        unique_packages,
        destination_counts: sorted_counts(by_destination)
            .into_iter()
            .map(|(destination, count)| DestinationCount { destination, count })
            .collect(),
        repeated_barcodes: sorted_counts(repeated)
            .into_iter()
            .map(|(barcode, count)| BarcodeCount { barcode, count })
            .collect(),
        unique_requests,
    }
}
