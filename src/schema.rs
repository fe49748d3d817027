//! Per-family column schemas.
//!
//! Each message family has a fixed allow-list of columns worth keeping and
//! a policy for its list-valued fields. The allow-list is explicit because
//! sites populate constant-looking columns inconsistently, so dropping by
//! observed cardinality is unreliable.

use crate::config::MessageCodes;
use crate::constants::{NUMERIC_SENTINEL, STATUS_SENTINEL};
use crate::normalizer::ListField;
use crate::table::EventTable;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How list-valued payload fields are flattened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPolicy {
    /// One row per aligned list position
    Explode,
    /// Keep only the first element
    FirstElement,
    /// No list fields expected
    None,
}

/// Message families the processor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageFamily {
    ItemsInducted,
    SortOutcome,
    DestinationRequest,
}

const SORT_LIST_FIELDS: [&str; 3] = ["requestedDestMCID", "sortCode", "requestedDestStatus"];

impl MessageFamily {
    /// Message code selecting this family
    pub fn code<'a>(&self, codes: &'a MessageCodes) -> &'a str {
        match self {
            MessageFamily::ItemsInducted => &codes.items_inducted,
            MessageFamily::SortOutcome => &codes.sort_outcome,
            MessageFamily::DestinationRequest => &codes.destination_request,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MessageFamily::ItemsInducted => "items_inducted",
            MessageFamily::SortOutcome => "sort_outcome",
            MessageFamily::DestinationRequest => "destination_request",
        }
    }

    /// Columns retained after pruning, in output order
    pub fn keep_columns(&self) -> &'static [&'static str] {
        match self {
            MessageFamily::SortOutcome => &[
                "timeStamp",
                "plcRecordNo",
                "itemID",
                "indexNo",
                "locationAWCS",
                "barcodeAWCS",
                "actualDestMCID",
                "requestedDestMCID",
                "sortCode",
            ],
            MessageFamily::ItemsInducted => &[
                "timeStamp",
                "timeStampPLC",
                "sequenceNo",
                "plcRecordNo",
                "itemID",
                "indexNo",
                "inductionStatus",
                "inductionNo",
                "carrierNo",
                "carrierCount",
            ],
            MessageFamily::DestinationRequest => &[
                "timeStamp",
                "timeStampPLC",
                "sequenceNo",
                "plcRecordNo",
                "itemID",
                "indexNo",
                "locationAWCS",
                "barcodeAWCS",
                "actualDestMCID",
                "requestedDestMCID",
                "sortCode",
            ],
        }
    }

    pub fn list_policy(&self) -> ListPolicy {
        match self {
            MessageFamily::SortOutcome => ListPolicy::Explode,
            MessageFamily::DestinationRequest => ListPolicy::FirstElement,
            MessageFamily::ItemsInducted => ListPolicy::None,
        }
    }

    /// List-capable fields and their padding sentinels
    pub fn list_fields(&self) -> Vec<ListField> {
        match self.list_policy() {
            ListPolicy::None => Vec::new(),
            _ => vec![
                ListField::numeric(SORT_LIST_FIELDS[0], NUMERIC_SENTINEL),
                ListField::numeric(SORT_LIST_FIELDS[1], NUMERIC_SENTINEL),
                ListField::status(SORT_LIST_FIELDS[2], STATUS_SENTINEL),
            ],
        }
    }

    pub fn list_field_names(&self) -> Vec<&'static str> {
        match self.list_policy() {
            ListPolicy::None => Vec::new(),
            _ => SORT_LIST_FIELDS.to_vec(),
        }
    }
}

/// Keep the family's allow-listed columns; idempotent and order-preserving
pub fn prune_columns(table: &EventTable, family: MessageFamily) -> EventTable {
    let (pruned, missing) = table.select(family.keep_columns());
    if !missing.is_empty() {
        debug!(
            "{}: allow-listed columns not present: {}",
            family.label(),
            missing.join(", ")
        );
    }
    pruned
}
