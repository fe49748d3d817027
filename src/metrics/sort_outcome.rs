//! Scanner, sort-code, defect and jackpot metrics over packaged sort events.
//!
//! Events arrive grouped by package in time order, as produced by
//! package reconstruction. Recirculation events (a success to a
//! recirculation target) are garbage for everything except the
//! recirculation count itself.

use crate::config::RecirculationRule;
use crate::constants::{JACKPOT_FLAG, NO_DEFECT_LABEL};
use crate::models::{PackageClass, PackagedEvent};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Read quality per package (first event of each package)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScannerMetrics {
    pub total: usize,
    pub normal: usize,
    pub no_read: usize,
    pub multi_read: usize,
}

/// Count for one sort reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Count for one (sort reason, Amazon destination) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonDestinationCount {
    pub reason: String,
    pub destination: String,
    pub count: usize,
}

/// Reasons down, destinations across, zero-filled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonDestinationPivot {
    pub destinations: Vec<String>,
    pub rows: Vec<(String, Vec<usize>)>,
}

impl ReasonDestinationPivot {
    pub fn get(&self, reason: &str, destination: &str) -> Option<usize> {
        let column = self.destinations.iter().position(|d| d == destination)?;
        self.rows
            .iter()
            .find(|(r, _)| r == reason)
            .map(|(_, counts)| counts[column])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortCodeMetrics {
    /// Distinct packages with more than one event and a recirculation event
    pub recirculation_packages: usize,
    /// Packages left after dropping recirculation events
    pub processed_packages: usize,
    /// Counts per sort reason, largest first
    pub sort_counts: Vec<ReasonCount>,
    /// Reason ascending, count descending
    pub reason_destinations: Vec<ReasonDestinationCount>,
    pub pivot: ReasonDestinationPivot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefectRow {
    pub category: String,
    pub count: usize,
    /// Share of processed packages, 4 decimals
    pub percentage: f64,
}

/// Scan-defect event as listed in the summary export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDefectRow {
    pub index_no: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub sort_code: i64,
}

/// Headline counts for a sort analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSummary {
    /// Sort events in the window
    pub window_events: usize,
    /// Distinct packages in the window
    pub packages_processed: usize,
    pub unique_packages: usize,
    pub recirculation_packages: usize,
    /// Events belonging to packages seen more than once
    pub recirculation_records: usize,
    pub jackpot_packages: usize,
}

/// Success to a recirculation target
pub fn is_recirculation_event(packaged: &PackagedEvent, rule: &RecirculationRule) -> bool {
    let event = &packaged.event;
    event.sort_code == Some(0)
        && rule.is_recirculation_target(
            event.requested_destination,
            event.jackpot_destination.as_deref(),
        )
}

fn package_sizes(events: &[PackagedEvent]) -> HashMap<&str, usize> {
    let mut sizes: HashMap<&str, usize> = HashMap::new();
    for packaged in events {
        *sizes.entry(packaged.package_id.as_str()).or_default() += 1;
    }
    sizes
}

fn first_per_package<'a, I>(events: I) -> Vec<&'a PackagedEvent>
where
    I: IntoIterator<Item = &'a PackagedEvent>,
{
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    events
        .into_iter()
        .filter(|packaged| seen.insert(packaged.package_id.as_str()))
        .collect()
}

/// Distinct package ids with at least two events and a recirculation event
pub fn recirculating_packages<'a>(
    events: &'a [PackagedEvent],
    rule: &RecirculationRule,
) -> BTreeSet<&'a str> {
    let sizes = package_sizes(events);
    events
        .iter()
        .filter(|packaged| sizes.get(packaged.package_id.as_str()).copied().unwrap_or(0) >= 2)
        .filter(|packaged| is_recirculation_event(packaged, rule))
        .map(|packaged| packaged.package_id.as_str())
        .collect()
}

/// First non-recirculation event of every package
pub fn processed_package_events<'a>(
    events: &'a [PackagedEvent],
    rule: &RecirculationRule,
) -> Vec<&'a PackagedEvent> {
    first_per_package(
        events
            .iter()
            .filter(|packaged| !is_recirculation_event(packaged, rule)),
    )
}

pub fn scanner_metrics(events: &[PackagedEvent]) -> ScannerMetrics {
    let mut metrics = ScannerMetrics::default();
    for packaged in first_per_package(events) {
        metrics.total += 1;
        match packaged.classification {
            PackageClass::Normal => metrics.normal += 1,
            PackageClass::NoRead => metrics.no_read += 1,
            PackageClass::MultiRead => metrics.multi_read += 1,
        }
    }
    metrics
}

pub fn sort_code_metrics(events: &[PackagedEvent], rule: &RecirculationRule) -> SortCodeMetrics {
    let processed = processed_package_events(events, rule);

    let mut by_reason: HashMap<&str, usize> = HashMap::new();
    let mut by_pair: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for packaged in &processed {
        let Some(reason) = packaged.event.sort_reason.map(|r| r.label()) else {
            continue;
        };
        *by_reason.entry(reason).or_default() += 1;
        if let Some(destination) = packaged.event.amazon_destination.as_deref() {
            *by_pair.entry((reason, destination)).or_default() += 1;
        }
    }

    let mut sort_counts: Vec<ReasonCount> = by_reason
        .into_iter()
        .map(|(reason, count)| ReasonCount {
            reason: reason.to_string(),
            count,
        })
        .collect();
    sort_counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));

    let mut reason_destinations: Vec<ReasonDestinationCount> = by_pair
        .iter()
        .map(|((reason, destination), count)| ReasonDestinationCount {
            reason: reason.to_string(),
            destination: destination.to_string(),
            count: *count,
        })
        .collect();
    reason_destinations.sort_by(|a, b| {
        a.reason
            .cmp(&b.reason)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.destination.cmp(&b.destination))
    });

    SortCodeMetrics {
        recirculation_packages: recirculating_packages(events, rule).len(),
        processed_packages: processed.len(),
        sort_counts,
        reason_destinations,
        pivot: pivot(&by_pair),
    }
}

fn pivot(by_pair: &BTreeMap<(&str, &str), usize>) -> ReasonDestinationPivot {
    let destinations: Vec<String> = by_pair
        .keys()
        .map(|(_, destination)| *destination)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows: Vec<(String, Vec<usize>)> = Vec::new();
    for ((reason, destination), count) in by_pair {
        if rows.last().is_none_or(|(r, _)| r != reason) {
            rows.push((reason.to_string(), vec![0; destinations.len()]));
        }
        let column = destinations
            .iter()
            .position(|d| d == destination)
            .unwrap_or_default();
        if let Some((_, counts)) = rows.last_mut() {
            counts[column] = *count;
        }
    }

    ReasonDestinationPivot { destinations, rows }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Defect categories over processed packages plus a `No Defect` remainder
pub fn defect_metrics(events: &[PackagedEvent], rule: &RecirculationRule) -> Vec<DefectRow> {
    let processed = processed_package_events(events, rule);
    let total = processed.len();

    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for packaged in &processed {
        if let Some(category) = packaged.event.defect_category {
            *by_category.entry(category.label()).or_default() += 1;
        }
    }
    let defects: usize = by_category.values().sum();

    let mut categories: Vec<(&str, usize)> = by_category.into_iter().collect();
    categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    categories.push((NO_DEFECT_LABEL, total - defects));

    categories
        .into_iter()
        .map(|(category, count)| DefectRow {
            category: category.to_string(),
            count,
            percentage: if total > 0 {
                round4(count as f64 / total as f64 * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}

/// Distinct packages sorted successfully to a jackpot-flagged destination
pub fn jackpot_packages(events: &[PackagedEvent]) -> usize {
    events
        .iter()
        .filter(|packaged| packaged.event.sort_code == Some(0))
        .filter(|packaged| {
            packaged
                .event
                .jackpot_destination
                .as_deref()
                .is_some_and(|flag| flag.trim().eq_ignore_ascii_case(JACKPOT_FLAG))
        })
        .map(|packaged| packaged.package_id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Window events whose sort code is a scan defect
pub fn scan_defect_events(events: &[PackagedEvent], scan_defect_codes: &[i64]) -> Vec<ScanDefectRow> {
    events
        .iter()
        .filter_map(|packaged| {
            let code = packaged.event.sort_code?;
            scan_defect_codes.contains(&code).then(|| ScanDefectRow {
                index_no: packaged.event.index_no.clone(),
                timestamp: packaged.event.timestamp,
                sort_code: code,
            })
        })
        .collect()
}

pub fn sort_summary(
    events: &[PackagedEvent],
    scanner: &ScannerMetrics,
    sort_codes: &SortCodeMetrics,
) -> SortSummary {
    let sizes = package_sizes(events);
    let recirculation_records = events
        .iter()
        .filter(|packaged| sizes.get(packaged.package_id.as_str()).copied().unwrap_or(0) >= 2)
        .count();

    SortSummary {
        window_events: events.len(),
        packages_processed: sizes.len(),
        unique_packages: scanner.total,
        recirculation_packages: sort_codes.recirculation_packages,
        recirculation_records,
        jackpot_packages: jackpot_packages(events),
    }
}
