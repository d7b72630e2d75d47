use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{numeric_or_zero, ContractRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WardCount {
    pub ward: u32,
    pub count: usize,
}

/// Contracts per ward for wards `1..=ward_count`, omitting empty wards.
///
/// A record belongs to a ward when its ward number reads as that number, so
/// `"03"` and `"3"` land in the same bucket. Records outside the range are not
/// reported.
#[must_use]
pub fn group_by_ward(records: &[ContractRecord], ward_count: u32) -> Vec<WardCount> {
    let wards = records.iter().map(|record| numeric_or_zero(&record.ward_no)).collect::<Vec<_>>();

    (1..=ward_count)
        .filter_map(|ward| {
            let target = Decimal::from(ward);
            let count = wards.iter().filter(|value| **value == target).count();
            (count > 0).then_some(WardCount { ward, count })
        })
        .collect()
}

/// Distinct fiscal-year labels, most recent first.
///
/// Labels are ordered lexicographically, which is chronological for the
/// `2080/081` style used in practice.
#[must_use]
pub fn fiscal_years(records: &[ContractRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.fiscal_year.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .map(str::to_string)
        .collect()
}

/// Ward numbers offered by the ward filter, as the strings records store.
#[must_use]
pub fn ward_options(ward_filter_count: u32) -> Vec<String> {
    (1..=ward_filter_count).map(|ward| ward.to_string()).collect()
}
