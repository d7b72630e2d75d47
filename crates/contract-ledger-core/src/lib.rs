//! Contract ledger kernel: typed contract records plus the pure computations the
//! dashboard and list views run against a snapshot of them.
//!
//! Nothing in this crate performs I/O. Callers hand in a slice of
//! [`ContractRecord`] and receive derived values back.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};
use ulid::Ulid;

mod aggregate;
mod document;
mod filter;
mod grouping;
mod lenient;
mod model;
mod numeric;
mod progress;
mod report;

pub use aggregate::{aggregate, PortfolioStats};
pub use document::{duplicate_contract_ids, parse_document, to_document};
pub use filter::{dashboard_preview, filter_contracts, ContractFilter};
pub use grouping::{fiscal_years, group_by_ward, ward_options, WardCount};
pub use model::{
    ContractRecord, GuaranteeKind, GuaranteeRecord, InstallmentRecord, InsuranceRecord,
};
pub use numeric::{display_percent, numeric_or_zero, percent_label, ratio_percent};
pub use progress::{financial_progress_percent, total_paid, ContractRow, ProgressStatus};
pub use report::{ContractReport, GuaranteeRow, InstallmentRow};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("import error: {0}")]
    Import(String),
    #[error("export error: {0}")]
    Export(String),
}

/// Opaque contract identifier.
///
/// Fresh identifiers are ULIDs, but any non-empty string read from an existing
/// document is accepted as-is.
#[derive(Debug, Clone, Serialize, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[serde(transparent)]
pub struct ContractId(pub String);

impl ContractId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for ContractId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ContractId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        lenient::string(deserializer).map(Self)
    }
}

/// Identifier for a nested guarantee or installment row.
#[must_use]
pub fn new_entry_id() -> String {
    Ulid::new().to_string()
}
