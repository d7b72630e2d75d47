use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{lenient, new_entry_id, ContractId, LedgerError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeKind {
    PerformanceBond,
    AdvancePayment,
    Insurance,
}

impl GuaranteeKind {
    /// Short label used on printed reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PerformanceBond => "PB",
            Self::AdvancePayment => "APG",
            Self::Insurance => "Insurance",
        }
    }
}

/// Performance bond or advance-payment guarantee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GuaranteeRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub institution: String,
    #[serde(rename = "no", deserialize_with = "lenient::string")]
    pub number: String,
    #[serde(deserialize_with = "lenient::string")]
    pub amount: String,
    #[serde(deserialize_with = "lenient::string")]
    pub expiry: String,
    #[serde(deserialize_with = "lenient::string")]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct InsuranceRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub institution: String,
    #[serde(rename = "no", deserialize_with = "lenient::string")]
    pub number: String,
    #[serde(deserialize_with = "lenient::string")]
    pub expiry: String,
    #[serde(deserialize_with = "lenient::string")]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallmentRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub amount: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payout_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub evaluation_amount: String,
    #[serde(deserialize_with = "lenient::string")]
    pub remarks: String,
}

/// One government construction contract as stored in the ledger document.
///
/// Monetary and percentage fields stay strings so that whatever was entered is
/// written back unchanged; computations read them through
/// [`crate::numeric_or_zero`]. Fields not modelled here are carried in `extra`
/// and survive a load/save cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractRecord {
    pub id: ContractId,
    #[serde(deserialize_with = "lenient::string")]
    pub fiscal_year: String,
    #[serde(deserialize_with = "lenient::string")]
    pub tender_no: String,
    #[serde(deserialize_with = "lenient::string")]
    pub notice_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub project_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub total_est_cost: String,
    #[serde(deserialize_with = "lenient::string")]
    pub grant_title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub municipality_grant: String,
    #[serde(deserialize_with = "lenient::string")]
    pub ward_no: String,
    #[serde(deserialize_with = "lenient::string")]
    pub project_type: String,
    #[serde(deserialize_with = "lenient::string")]
    pub project_mode: String,
    #[serde(rename = "budgetThisFY", deserialize_with = "lenient::string")]
    pub budget_this_fy: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub source_assurance_required: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub assured_source: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contract_amount: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contract_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub completion_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub physical_progress: String,
    #[serde(deserialize_with = "lenient::string")]
    pub extension_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub extended_period: String,
    #[serde(deserialize_with = "lenient::string")]
    pub site_in_charge: String,
    #[serde(deserialize_with = "lenient::string")]
    pub contact_no: String,
    #[serde(deserialize_with = "lenient::string")]
    pub project_status: String,
    #[serde(deserialize_with = "lenient::string")]
    pub operation_decision: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payment_amount: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payment_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub firm_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub firm_address: String,
    #[serde(deserialize_with = "lenient::string")]
    pub proprietor_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub proprietor_contact: String,
    #[serde(deserialize_with = "lenient::string")]
    pub pan_no: String,
    #[serde(deserialize_with = "lenient::list")]
    pub pb_records: Vec<GuaranteeRecord>,
    #[serde(deserialize_with = "lenient::list")]
    pub apg_records: Vec<GuaranteeRecord>,
    #[serde(deserialize_with = "lenient::list")]
    pub insurance_records: Vec<InsuranceRecord>,
    #[serde(deserialize_with = "lenient::string")]
    pub other_doc_inst: String,
    #[serde(deserialize_with = "lenient::string")]
    pub other_doc_no: String,
    #[serde(deserialize_with = "lenient::string")]
    pub other_doc_remarks: String,
    #[serde(deserialize_with = "lenient::string")]
    pub today_work: String,
    #[serde(deserialize_with = "lenient::string")]
    pub today_date: String,
    #[serde(deserialize_with = "lenient::string")]
    pub current_installment: String,
    #[serde(deserialize_with = "lenient::string")]
    pub work_status: String,
    #[serde(deserialize_with = "lenient::list")]
    pub installments: Vec<InstallmentRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractRecord {
    /// Check the identity invariants a record must hold before it is saved.
    ///
    /// # Errors
    /// Returns [`LedgerError::Validation`] when the contract id is blank, or when a
    /// nested guarantee or installment id is blank or repeated within its own list.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.id.is_blank() {
            return Err(LedgerError::Validation("contract id MUST be non-empty".to_string()));
        }

        check_entry_ids("pbRecords", self.pb_records.iter().map(|row| row.id.as_str()))?;
        check_entry_ids("apgRecords", self.apg_records.iter().map(|row| row.id.as_str()))?;
        check_entry_ids(
            "insuranceRecords",
            self.insurance_records.iter().map(|row| row.id.as_str()),
        )?;
        check_entry_ids("installments", self.installments.iter().map(|row| row.id.as_str()))?;

        Ok(())
    }

    /// Give every nested row without an id a fresh one. Existing ids are kept.
    pub fn assign_missing_entry_ids(&mut self) {
        fn fill(id: &mut String) {
            if id.trim().is_empty() {
                *id = new_entry_id();
            }
        }

        self.pb_records.iter_mut().for_each(|row| fill(&mut row.id));
        self.apg_records.iter_mut().for_each(|row| fill(&mut row.id));
        self.insurance_records.iter_mut().for_each(|row| fill(&mut row.id));
        self.installments.iter_mut().for_each(|row| fill(&mut row.id));
    }
}

fn check_entry_ids<'a>(
    collection: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), LedgerError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(LedgerError::Validation(format!("{collection} ids MUST be non-empty")));
        }
        if !seen.insert(id) {
            return Err(LedgerError::Validation(format!(
                "{collection} ids MUST be unique within the contract (duplicate: {id})"
            )));
        }
    }
    Ok(())
}
