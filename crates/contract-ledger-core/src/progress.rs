use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::numeric::saturating_sum;
use crate::{
    display_percent, numeric_or_zero, percent_label, ratio_percent, ContractId, ContractRecord,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Ongoing,
    Completed,
}

impl ProgressStatus {
    /// Status badge for a physical progress value. Only exactly 100 is
    /// completed; values above 100 render as a full bar but stay ongoing.
    #[must_use]
    pub fn from_physical_progress(progress: Decimal) -> Self {
        if progress == Decimal::ONE_HUNDRED {
            Self::Completed
        } else {
            Self::Ongoing
        }
    }
}

/// Sum of a contract's installment amounts.
#[must_use]
pub fn total_paid(record: &ContractRecord) -> Decimal {
    saturating_sum(
        record.installments.iter().map(|installment| numeric_or_zero(&installment.amount)),
    )
}

/// Paid-out share of one contract's amount, in percent.
#[must_use]
pub fn financial_progress_percent(record: &ContractRecord) -> Decimal {
    ratio_percent(total_paid(record), numeric_or_zero(&record.contract_amount))
}

/// One line of the contract list view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractRow {
    pub id: ContractId,
    pub fiscal_year: String,
    pub tender_no: String,
    pub project_name: String,
    pub ward_no: String,
    pub firm_name: String,
    pub completion_date: String,
    pub contract_amount: Decimal,
    pub total_paid: Decimal,
    pub financial_progress_percent: Decimal,
    pub financial_progress_label: String,
    pub physical_progress: String,
    pub physical_progress_display: Decimal,
    pub status: ProgressStatus,
}

impl ContractRow {
    #[must_use]
    pub fn from_record(record: &ContractRecord) -> Self {
        let physical = numeric_or_zero(&record.physical_progress);
        let financial = financial_progress_percent(record);
        Self {
            id: record.id.clone(),
            fiscal_year: record.fiscal_year.clone(),
            tender_no: record.tender_no.clone(),
            project_name: record.project_name.clone(),
            ward_no: record.ward_no.clone(),
            firm_name: record.firm_name.clone(),
            completion_date: record.completion_date.clone(),
            contract_amount: numeric_or_zero(&record.contract_amount),
            total_paid: total_paid(record),
            financial_progress_percent: financial,
            financial_progress_label: percent_label(financial),
            physical_progress: record.physical_progress.clone(),
            physical_progress_display: display_percent(physical),
            status: ProgressStatus::from_physical_progress(physical),
        }
    }
}
