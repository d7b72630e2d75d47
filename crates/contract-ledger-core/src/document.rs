use std::collections::BTreeSet;

use serde_json::Value;

use crate::{ContractId, ContractRecord, LedgerError};

/// Read a ledger document: a JSON array of contract records.
///
/// Only text that is not JSON, or JSON that is not an array, is rejected.
/// Everything inside the array is read leniently: elements that are not objects
/// are dropped, and mistyped fields inside an object fall back to their
/// defaults, so one malformed row never costs the rest of the ledger.
///
/// # Errors
/// Returns [`LedgerError::Import`] describing why the document was rejected.
pub fn parse_document(raw: &str) -> Result<Vec<ContractRecord>, LedgerError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| LedgerError::Import(format!("document is not valid JSON: {err}")))?;

    let Value::Array(items) = value else {
        return Err(LedgerError::Import("document MUST be a JSON array".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .filter(|(_, item)| item.is_object())
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|err| {
                LedgerError::Import(format!("element {index} is not a contract record: {err}"))
            })
        })
        .collect()
}

/// Serialize a snapshot as the pretty-printed document used for storage and export.
///
/// # Errors
/// Returns [`LedgerError::Export`] when a record cannot be serialized.
pub fn to_document(records: &[ContractRecord]) -> Result<String, LedgerError> {
    serde_json::to_string_pretty(records)
        .map_err(|err| LedgerError::Export(format!("failed to serialize contracts: {err}")))
}

/// Contract ids that occur more than once, in ascending order.
#[must_use]
pub fn duplicate_contract_ids(records: &[ContractRecord]) -> Vec<ContractId> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for record in records {
        if !seen.insert(&record.id) {
            duplicates.insert(record.id.clone());
        }
    }
    duplicates.into_iter().collect()
}
