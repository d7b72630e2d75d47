use serde::{Deserialize, Serialize};

use crate::ContractRecord;

/// Search text plus optional ward and fiscal-year constraints.
///
/// An empty string in any slot means "match everything" for that dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContractFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub ward_no: Option<String>,
    #[serde(default)]
    pub fiscal_year: Option<String>,
}

impl ContractFilter {
    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: term.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ward(mut self, ward_no: impl Into<String>) -> Self {
        self.ward_no = Some(ward_no.into());
        self
    }

    #[must_use]
    pub fn with_fiscal_year(mut self, fiscal_year: impl Into<String>) -> Self {
        self.fiscal_year = Some(fiscal_year.into());
        self
    }

    fn matches(&self, needle: &str, record: &ContractRecord) -> bool {
        let matches_search = needle.is_empty()
            || [&record.project_name, &record.tender_no, &record.firm_name]
                .into_iter()
                .any(|field| field.to_lowercase().contains(needle));

        matches_search
            && constraint_holds(self.ward_no.as_deref(), &record.ward_no)
            && constraint_holds(self.fiscal_year.as_deref(), &record.fiscal_year)
    }
}

fn constraint_holds(constraint: Option<&str>, value: &str) -> bool {
    match constraint {
        Some(expected) if !expected.is_empty() => expected == value,
        _ => true,
    }
}

/// Records matching every constraint of `filter`, in their original order.
///
/// The search term is a case-insensitive substring of the project name, tender
/// number or firm name. Ward and fiscal year compare by exact string equality.
#[must_use]
pub fn filter_contracts<'a>(
    records: &'a [ContractRecord],
    filter: &ContractFilter,
) -> Vec<&'a ContractRecord> {
    let needle = filter.search.to_lowercase();
    records.iter().filter(|record| filter.matches(&needle, record)).collect()
}

/// The first `limit` records in collection order, as shown on the dashboard.
#[must_use]
pub fn dashboard_preview(records: &[ContractRecord], limit: usize) -> &[ContractRecord] {
    &records[..records.len().min(limit)]
}
