use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::numeric::saturating_sum;
use crate::{numeric_or_zero, ContractId, ContractRecord, GuaranteeKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuaranteeRow {
    pub kind: GuaranteeKind,
    pub label: String,
    pub institution: String,
    pub number: String,
    /// Absent for insurance, which carries no amount.
    pub amount: Option<String>,
    pub expiry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallmentRow {
    pub sequence: usize,
    pub amount: Decimal,
    pub payout_date: String,
    pub evaluation_amount: Decimal,
}

/// Printable summary of one contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractReport {
    pub id: ContractId,
    pub project_name: String,
    pub fiscal_year: String,
    pub tender_no: String,
    pub ward_no: String,
    pub project_type: String,
    pub firm_name: String,
    pub pan_no: String,
    pub contract_amount: Decimal,
    pub completion_date: String,
    pub guarantees: Vec<GuaranteeRow>,
    pub installments: Vec<InstallmentRow>,
    pub installment_total: Decimal,
}

impl ContractReport {
    /// Guarantees are listed performance bonds first, then advance-payment
    /// guarantees, then insurance; installments are numbered from 1.
    #[must_use]
    pub fn build(record: &ContractRecord) -> Self {
        let bonds = record.pb_records.iter().map(|row| (GuaranteeKind::PerformanceBond, row));
        let advances = record.apg_records.iter().map(|row| (GuaranteeKind::AdvancePayment, row));
        let mut guarantees = bonds
            .chain(advances)
            .map(|(kind, row)| GuaranteeRow {
                kind,
                label: kind.label().to_string(),
                institution: row.institution.clone(),
                number: row.number.clone(),
                amount: Some(row.amount.clone()),
                expiry: row.expiry.clone(),
            })
            .collect::<Vec<_>>();
        guarantees.extend(record.insurance_records.iter().map(|row| GuaranteeRow {
            kind: GuaranteeKind::Insurance,
            label: GuaranteeKind::Insurance.label().to_string(),
            institution: row.institution.clone(),
            number: row.number.clone(),
            amount: None,
            expiry: row.expiry.clone(),
        }));

        let installments = record
            .installments
            .iter()
            .enumerate()
            .map(|(index, row)| InstallmentRow {
                sequence: index + 1,
                amount: numeric_or_zero(&row.amount),
                payout_date: row.payout_date.clone(),
                evaluation_amount: numeric_or_zero(&row.evaluation_amount),
            })
            .collect::<Vec<_>>();
        let installment_total = saturating_sum(installments.iter().map(|row| row.amount));

        Self {
            id: record.id.clone(),
            project_name: record.project_name.clone(),
            fiscal_year: record.fiscal_year.clone(),
            tender_no: record.tender_no.clone(),
            ward_no: record.ward_no.clone(),
            project_type: record.project_type.clone(),
            firm_name: record.firm_name.clone(),
            pan_no: record.pan_no.clone(),
            contract_amount: numeric_or_zero(&record.contract_amount),
            completion_date: record.completion_date.clone(),
            guarantees,
            installments,
            installment_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GuaranteeRecord, InstallmentRecord, InsuranceRecord};

    #[test]
    fn report_orders_guarantees_and_numbers_installments() {
        let record = ContractRecord {
            id: ContractId::from("c1"),
            project_name: "Bridge".to_string(),
            contract_amount: "900000".to_string(),
            insurance_records: vec![InsuranceRecord {
                id: "in".to_string(),
                institution: "Sagarmatha".to_string(),
                ..Default::default()
            }],
            apg_records: vec![GuaranteeRecord {
                id: "apg".to_string(),
                amount: "90000".to_string(),
                ..Default::default()
            }],
            pb_records: vec![GuaranteeRecord {
                id: "pb".to_string(),
                amount: "45000".to_string(),
                ..Default::default()
            }],
            installments: vec![
                InstallmentRecord {
                    id: "1".to_string(),
                    amount: "100000".to_string(),
                    evaluation_amount: "110000".to_string(),
                    ..Default::default()
                },
                InstallmentRecord {
                    id: "2".to_string(),
                    amount: "oops".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let report = ContractReport::build(&record);
        let labels = report.guarantees.iter().map(|row| row.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["PB", "APG", "Insurance"]);
        assert_eq!(report.guarantees[2].amount, None);
        assert_eq!(report.guarantees[0].amount.as_deref(), Some("45000"));
        assert_eq!(
            report.installments.iter().map(|row| row.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(report.installments[1].amount, Decimal::ZERO);
        assert_eq!(report.installment_total, Decimal::from(100_000));
        assert_eq!(report.contract_amount, Decimal::from(900_000));
    }
}
