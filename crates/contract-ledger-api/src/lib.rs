use std::path::Path;

use anyhow::{anyhow, Result};
use contract_ledger_core::{
    aggregate, dashboard_preview, filter_contracts, fiscal_years, group_by_ward, new_entry_id,
    percent_label, ward_options, ContractFilter, ContractId, ContractRecord, ContractReport,
    ContractRow, GuaranteeKind, GuaranteeRecord, InstallmentRecord, InsuranceRecord, WardCount,
};
use contract_ledger_store_json::{
    Confirmation, ContractStore, DeleteOutcome, ExportSummary, FileBackend, ImportOutcome,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

mod config;

pub use config::LedgerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsView {
    pub count: usize,
    pub total_contract_amount: Decimal,
    pub total_paid_amount: Decimal,
    pub active_projects: usize,
    pub financial_progress_percent: Decimal,
    pub financial_progress_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractListView {
    pub filter: ContractFilter,
    pub total_records: usize,
    pub matched_records: usize,
    pub rows: Vec<ContractRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardView {
    pub stats: StatsView,
    pub wards: Vec<WardCount>,
    pub fiscal_years: Vec<String>,
    pub recent: Vec<ContractRow>,
    pub load_warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AddInstallmentRequest {
    pub amount: String,
    pub payout_date: String,
    pub evaluation_amount: String,
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddGuaranteeRequest {
    pub kind: GuaranteeKind,
    pub institution: String,
    pub number: String,
    /// Ignored for insurance.
    pub amount: String,
    pub expiry: String,
    pub remarks: String,
}

/// Host-facing entry point. Every call works on a freshly opened store, so
/// concurrent hosts always see the latest persisted document.
#[derive(Debug, Clone)]
pub struct ContractLedgerApi {
    config: LedgerConfig,
}

impl ContractLedgerApi {
    /// # Errors
    /// Returns an error when `config` fails validation.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn open_store(&self) -> Result<ContractStore<FileBackend>> {
        let backend = FileBackend::new(&self.config.storage_dir, &self.config.storage_key)?;
        ContractStore::open(backend)
    }

    /// Store a new contract under a freshly generated id.
    ///
    /// # Errors
    /// Returns an error when the record is invalid or cannot be persisted.
    pub fn add_contract(&self, record: ContractRecord) -> Result<ContractRecord> {
        let mut store = self.open_store()?;
        store.add(record)
    }

    /// Replace a contract wholesale, keeping its id.
    ///
    /// # Errors
    /// Returns an error when the id is unknown, the record is invalid, or
    /// persistence fails.
    pub fn update_contract(
        &self,
        id: &ContractId,
        record: ContractRecord,
    ) -> Result<ContractRecord> {
        let mut store = self.open_store()?;
        store.update(id, record)
    }

    /// # Errors
    /// Returns an error when the store cannot be opened or persisted.
    pub fn delete_contract(
        &self,
        id: &ContractId,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome> {
        let mut store = self.open_store()?;
        store.delete(id, confirmation)
    }

    /// # Errors
    /// Returns an error when no contract has `id`.
    pub fn get_contract(&self, id: &ContractId) -> Result<ContractRecord> {
        let store = self.open_store()?;
        store.get(id).cloned().ok_or_else(|| anyhow!("contract not found: {id}"))
    }

    /// Append a payment installment to a contract.
    ///
    /// # Errors
    /// Returns an error when the contract is unknown or persistence fails.
    pub fn add_installment(
        &self,
        id: &ContractId,
        request: AddInstallmentRequest,
    ) -> Result<ContractRecord> {
        let mut store = self.open_store()?;
        store.edit(id, |record| {
            record.installments.push(InstallmentRecord {
                id: new_entry_id(),
                amount: request.amount,
                payout_date: request.payout_date,
                evaluation_amount: request.evaluation_amount,
                remarks: request.remarks,
            });
        })
    }

    /// Append a performance bond, advance-payment guarantee or insurance policy.
    ///
    /// # Errors
    /// Returns an error when the contract is unknown or persistence fails.
    pub fn add_guarantee(
        &self,
        id: &ContractId,
        request: AddGuaranteeRequest,
    ) -> Result<ContractRecord> {
        let mut store = self.open_store()?;
        store.edit(id, |record| match request.kind {
            GuaranteeKind::Insurance => record.insurance_records.push(InsuranceRecord {
                id: new_entry_id(),
                institution: request.institution,
                number: request.number,
                expiry: request.expiry,
                remarks: request.remarks,
            }),
            kind => {
                let row = GuaranteeRecord {
                    id: new_entry_id(),
                    institution: request.institution,
                    number: request.number,
                    amount: request.amount,
                    expiry: request.expiry,
                    remarks: request.remarks,
                };
                if kind == GuaranteeKind::PerformanceBond {
                    record.pb_records.push(row);
                } else {
                    record.apg_records.push(row);
                }
            }
        })
    }

    /// # Errors
    /// Returns an error when the store cannot be opened.
    pub fn list(&self, filter: &ContractFilter) -> Result<ContractListView> {
        let store = self.open_store()?;
        let snapshot = store.snapshot();
        let rows = filter_contracts(&snapshot, filter)
            .into_iter()
            .map(ContractRow::from_record)
            .collect::<Vec<_>>();
        Ok(ContractListView {
            filter: filter.clone(),
            total_records: snapshot.len(),
            matched_records: rows.len(),
            rows,
        })
    }

    /// # Errors
    /// Returns an error when the store cannot be opened.
    pub fn stats(&self) -> Result<StatsView> {
        let store = self.open_store()?;
        Ok(stats_view(&store.snapshot()))
    }

    /// Cards, ward breakdown, fiscal years and the most recent contracts.
    ///
    /// # Errors
    /// Returns an error when the store cannot be opened.
    pub fn dashboard(&self) -> Result<DashboardView> {
        let store = self.open_store()?;
        let snapshot = store.snapshot();
        if let Some(warning) = store.load_warning() {
            tracing::warn!(warning, "dashboard built from an empty ledger");
        }
        Ok(DashboardView {
            stats: stats_view(&snapshot),
            wards: group_by_ward(&snapshot, self.config.ward_count),
            fiscal_years: fiscal_years(&snapshot),
            recent: dashboard_preview(&snapshot, self.config.dashboard_preview_limit)
                .iter()
                .map(ContractRow::from_record)
                .collect(),
            load_warning: store.load_warning().map(str::to_string),
        })
    }

    /// # Errors
    /// Returns an error when the store cannot be opened.
    pub fn wards(&self) -> Result<Vec<WardCount>> {
        let store = self.open_store()?;
        Ok(group_by_ward(&store.snapshot(), self.config.ward_count))
    }

    /// # Errors
    /// Returns an error when the store cannot be opened.
    pub fn fiscal_years(&self) -> Result<Vec<String>> {
        let store = self.open_store()?;
        Ok(fiscal_years(&store.snapshot()))
    }

    #[must_use]
    pub fn ward_filter_options(&self) -> Vec<String> {
        ward_options(self.config.ward_filter_count)
    }

    /// # Errors
    /// Returns an error when no contract has `id`.
    pub fn report(&self, id: &ContractId) -> Result<ContractReport> {
        let record = self.get_contract(id)?;
        Ok(ContractReport::build(&record))
    }

    /// Write a dated backup of the whole ledger into `out_dir`.
    ///
    /// # Errors
    /// Returns an error when the backup cannot be written.
    pub fn export(&self, out_dir: &Path, date: Date) -> Result<ExportSummary> {
        let store = self.open_store()?;
        store.export_to_dir(out_dir, date)
    }

    /// Replace the ledger with the document at `path` when confirmed.
    ///
    /// # Errors
    /// Returns an error when the document is unreadable or invalid; the ledger
    /// is left as it was.
    pub fn import(&self, path: &Path, confirmation: Confirmation) -> Result<ImportOutcome> {
        let mut store = self.open_store()?;
        let outcome = store.import_file(path, confirmation)?;
        tracing::info!(
            path = %path.display(),
            applied = outcome.applied,
            records = outcome.imported_records,
            "import finished"
        );
        Ok(outcome)
    }
}

fn stats_view(records: &[ContractRecord]) -> StatsView {
    let stats = aggregate(records);
    let financial = stats.financial_progress_percent();
    StatsView {
        count: stats.count,
        total_contract_amount: stats.total_contract_amount,
        total_paid_amount: stats.total_paid_amount,
        active_projects: stats.active_projects,
        financial_progress_percent: financial,
        financial_progress_label: percent_label(financial),
    }
}
