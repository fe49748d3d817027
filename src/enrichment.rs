//! Lookup joins onto sort events.
//!
//! Sort code to reason, reason to defect category, and requested
//! destination to its site names. Every join is a left join: unmapped keys
//! leave the enriched fields empty and the event count never changes.

use crate::mapping::DestinationMap;
use crate::models::{SortEvent, SortReason};
use tracing::debug;

/// Recompute reason and category from the event's current sort code
pub fn derive_sort_outcome(event: &mut SortEvent) {
    event.sort_reason = event.sort_code.and_then(SortReason::from_code);
    event.defect_category = event.sort_reason.and_then(|reason| reason.defect_category());
}

/// Attach sort reason, defect category, and destination names
pub fn enrich_events(mut events: Vec<SortEvent>, mapping: &DestinationMap) -> Vec<SortEvent> {
    let mut unmapped_destinations = 0usize;

    for event in &mut events {
        derive_sort_outcome(event);

        match event.requested_destination.and_then(|id| mapping.get(id)) {
            Some(info) => {
                event.amazon_destination = info.amazon.clone();
                event.beumer_destination = info.beumer.clone();
                event.jackpot_destination = info.jackpot.clone();
            }
            None => {
                event.amazon_destination = None;
                event.beumer_destination = None;
                event.jackpot_destination = None;
                unmapped_destinations += 1;
            }
        }
    }

    debug!(
        "Enriched {} events, {} without a mapped destination",
        events.len(),
        unmapped_destinations
    );
    events
}
