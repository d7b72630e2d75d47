use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::numeric::saturating_sum;
use crate::{numeric_or_zero, ratio_percent, total_paid, ContractRecord};

/// Portfolio-wide totals shown on the dashboard cards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PortfolioStats {
    pub count: usize,
    pub total_contract_amount: Decimal,
    pub total_paid_amount: Decimal,
    pub active_projects: usize,
}

impl PortfolioStats {
    /// Share of the contracted amount already paid out, in percent.
    #[must_use]
    pub fn financial_progress_percent(&self) -> Decimal {
        ratio_percent(self.total_paid_amount, self.total_contract_amount)
    }
}

/// Reduce a snapshot to its portfolio totals.
///
/// A project is active while its physical progress reads below 100; an
/// unreadable progress value counts as zero and therefore as active.
#[must_use]
pub fn aggregate(records: &[ContractRecord]) -> PortfolioStats {
    PortfolioStats {
        count: records.len(),
        total_contract_amount: saturating_sum(
            records.iter().map(|record| numeric_or_zero(&record.contract_amount)),
        ),
        total_paid_amount: saturating_sum(records.iter().map(total_paid)),
        active_projects: records
            .iter()
            .filter(|record| numeric_or_zero(&record.physical_progress) < Decimal::ONE_HUNDRED)
            .count(),
    }
}
