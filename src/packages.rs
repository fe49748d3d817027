//! Package reconstruction.
//!
//! The sorter reuses item ids, and one physical item can pass the scanner
//! several times. Events are grouped per item id in time order and a gap
//! longer than the threshold starts a new package, so a package id is
//! `itemID_segment` with segments counted from 1.

use crate::models::{PackageClass, PackagedEvent, SortEvent};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use tracing::debug;

/// Per-package roll-up
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSummary {
    pub package_id: String,
    pub item_id: String,
    pub event_count: usize,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub classification: PackageClass,
}

fn is_no_read(barcode: &str) -> bool {
    !barcode.is_empty() && barcode.chars().all(|ch| ch == '?')
}

fn is_multi_read(barcode: &str) -> bool {
    !barcode.is_empty() && barcode.chars().all(|ch| ch == '9')
}

/// `no_read` if every barcode is all `?`, `multi_read` if every barcode is
/// all `9`, otherwise `normal`. A missing barcode matches neither pattern.
pub fn classify_barcodes<'a, I>(barcodes: I) -> PackageClass
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut all_no_read = true;
    let mut all_multi_read = true;
    let mut seen = false;

    for barcode in barcodes {
        seen = true;
        let barcode = barcode.unwrap_or_default();
        all_no_read &= is_no_read(barcode);
        all_multi_read &= is_multi_read(barcode);
    }

    if seen && all_no_read {
        PackageClass::NoRead
    } else if seen && all_multi_read {
        PackageClass::MultiRead
    } else {
        PackageClass::Normal
    }
}

fn compare_events(a: &SortEvent, b: &SortEvent) -> Ordering {
    let item_a = a.item_id.as_deref().unwrap_or_default();
    let item_b = b.item_id.as_deref().unwrap_or_default();
    item_a.cmp(item_b).then_with(|| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/// Assign every event to exactly one package, ordered by (item id, time)
///
/// Untimed events sort last within their item id and never open a new
/// package. Events without an item id are grouped under an empty id.
pub fn reconstruct_packages(mut events: Vec<SortEvent>, gap_secs: i64) -> Vec<PackagedEvent> {
    events.sort_by(compare_events);
    let gap_millis = gap_secs.saturating_mul(1000);

    let mut assigned: Vec<(SortEvent, String)> = Vec::with_capacity(events.len());
    let mut current_item: Option<String> = None;
    let mut segment = 0usize;
    let mut previous: Option<NaiveDateTime> = None;

    for event in events {
        let item = event.item_id.clone().unwrap_or_default();

        if current_item.as_deref() != Some(item.as_str()) {
            current_item = Some(item.clone());
            segment = 1;
            previous = None;
        }

        if let Some(timestamp) = event.timestamp {
            if let Some(last) = previous {
                if (timestamp - last).num_milliseconds() > gap_millis {
                    segment += 1;
                }
            }
            previous = Some(timestamp);
        }

        assigned.push((event, format!("{}_{}", item, segment)));
    }

    let mut packaged: Vec<PackagedEvent> = Vec::with_capacity(assigned.len());
    let mut start = 0;
    while start < assigned.len() {
        let package_id = &assigned[start].1;
        let end = assigned[start..]
            .iter()
            .position(|(_, id)| id != package_id)
            .map_or(assigned.len(), |offset| start + offset);

        let classification = classify_barcodes(
            assigned[start..end]
                .iter()
                .map(|(event, _)| event.barcode.as_deref()),
        );

        for (event, package_id) in &assigned[start..end] {
            packaged.push(PackagedEvent {
                event: event.clone(),
                package_id: package_id.clone(),
                classification,
            });
        }
        start = end;
    }

    debug!(
        "Reconstructed {} packages from {} events",
        count_packages(&packaged),
        packaged.len()
    );
    packaged
}

/// Number of distinct packages
pub fn count_packages(events: &[PackagedEvent]) -> usize {
    let mut ids: Vec<&str> = events.iter().map(|e| e.package_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

/// One summary per package, in package order
pub fn summarize_packages(events: &[PackagedEvent]) -> Vec<PackageSummary> {
    let mut summaries: Vec<PackageSummary> = Vec::new();

    for packaged in events {
        let timestamp = packaged.event.timestamp;
        match summaries.last_mut() {
            Some(summary) if summary.package_id == packaged.package_id => {
                summary.event_count += 1;
                summary.first_seen = min_option(summary.first_seen, timestamp);
                summary.last_seen = max_option(summary.last_seen, timestamp);
            }
            _ => summaries.push(PackageSummary {
                package_id: packaged.package_id.clone(),
                item_id: packaged.event.item_id.clone().unwrap_or_default(),
                event_count: 1,
                first_seen: timestamp,
                last_seen: timestamp,
                classification: packaged.classification,
            }),
        }
    }

    summaries
}

fn min_option(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn max_option(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-09-24 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn event(item: &str, offset_secs: i64, barcode: &str) -> SortEvent {
        SortEvent {
            item_id: Some(item.to_string()),
            timestamp: Some(base() + Duration::seconds(offset_secs)),
            barcode: Some(barcode.to_string()),
            ..SortEvent::default()
        }
    }

    fn ids(packaged: &[PackagedEvent]) -> Vec<&str> {
        packaged.iter().map(|p| p.package_id.as_str()).collect()
    }

    #[test]
    fn test_gap_above_threshold_splits() {
        let packaged = reconstruct_packages(
            vec![event("A", 0, "X1"), event("A", 1801, "X1")],
            1800,
        );
        assert_eq!(ids(&packaged), vec!["A_1", "A_2"]);
    }

    #[test]
    fn test_gap_at_threshold_does_not_split() {
        let packaged = reconstruct_packages(
            vec![event("A", 1800, "X1"), event("A", 0, "X1")],
            1800,
        );
        assert_eq!(ids(&packaged), vec!["A_1", "A_1"]);
        assert!(packaged[0].event.timestamp < packaged[1].event.timestamp);
    }

    #[test]
    fn test_sub_second_gap_over_threshold_splits() {
        let mut late = event("A", 1800, "X1");
        late.timestamp = late.timestamp.map(|ts| ts + Duration::milliseconds(1));
        let packaged = reconstruct_packages(vec![event("A", 0, "X1"), late], 1800);
        assert_eq!(ids(&packaged), vec!["A_1", "A_2"]);
    }

    #[test]
    fn test_items_are_segmented_independently() {
        let packaged = reconstruct_packages(
            vec![
                event("B", 0, "X"),
                event("A", 5000, "Y"),
                event("A", 0, "Y"),
                event("B", 10, "X"),
            ],
            1800,
        );
        assert_eq!(ids(&packaged), vec!["A_1", "A_2", "B_1", "B_1"]);
        assert_eq!(count_packages(&packaged), 3);
    }

    #[test]
    fn test_untimed_events_do_not_split() {
        let mut untimed = event("A", 0, "X");
        untimed.timestamp = None;
        let packaged = reconstruct_packages(
            vec![untimed, event("A", 0, "X"), event("A", 4000, "X")],
            1800,
        );
        assert_eq!(ids(&packaged), vec!["A_1", "A_2", "A_2"]);
        assert!(packaged[2].event.timestamp.is_none());
    }

    #[test]
    fn test_missing_item_id_groups_together() {
        let mut a = event("", 0, "X");
        a.item_id = None;
        let b = event("", 10, "X");
        let packaged = reconstruct_packages(vec![a, b], 1800);
        assert_eq!(ids(&packaged), vec!["_1", "_1"]);
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            classify_barcodes([Some("????"), Some("????")]),
            PackageClass::NoRead
        );
        assert_eq!(
            classify_barcodes([Some("9999"), Some("99")]),
            PackageClass::MultiRead
        );
        assert_eq!(
            classify_barcodes([Some("9999"), Some("ABC123")]),
            PackageClass::Normal
        );
        assert_eq!(
            classify_barcodes([Some("????"), None]),
            PackageClass::Normal
        );
    }

    #[test]
    fn test_classification_is_per_package() {
        let packaged = reconstruct_packages(
            vec![
                event("A", 0, "????"),
                event("A", 10, "????"),
                event("A", 5000, "ABC"),
            ],
            1800,
        );
        assert_eq!(packaged[0].classification, PackageClass::NoRead);
        assert_eq!(packaged[1].classification, PackageClass::NoRead);
        assert_eq!(packaged[2].classification, PackageClass::Normal);

        let summaries = summarize_packages(&packaged);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].event_count, 2);
        assert_eq!(summaries[0].last_seen, Some(base() + Duration::seconds(10)));
    }
}
