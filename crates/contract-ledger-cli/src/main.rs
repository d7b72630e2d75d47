use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use contract_ledger_api::{
    AddGuaranteeRequest, AddInstallmentRequest, ContractLedgerApi, LedgerConfig,
};
use contract_ledger_core::{ContractFilter, ContractId, ContractRecord, GuaranteeKind};
use contract_ledger_store_json::Confirmation;
use serde_json::Value;
use time::{Date, OffsetDateTime};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "cms")]
#[command(about = "Contract management ledger CLI")]
struct Cli {
    /// YAML config file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured storage directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Contract {
        #[command(subcommand)]
        command: Box<ContractCommand>,
    },
    Installment {
        #[command(subcommand)]
        command: InstallmentCommand,
    },
    Guarantee {
        #[command(subcommand)]
        command: GuaranteeCommand,
    },
    Stats,
    Dashboard,
    Wards,
    FiscalYears,
    Report(IdArgs),
    Data {
        #[command(subcommand)]
        command: DataCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ContractCommand {
    Add(ContractFieldArgs),
    Update {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        fields: ContractFieldArgs,
    },
    Delete {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        confirm: ConfirmArgs,
    },
    Show(IdArgs),
    List(ListArgs),
}

#[derive(Debug, Args)]
struct IdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct ConfirmArgs {
    /// Confirm the destructive action; without it nothing changes
    #[arg(long, default_value_t = false)]
    yes: bool,
}

#[derive(Debug, Args, Default)]
struct ContractFieldArgs {
    /// Start from a full contract document (one JSON object) before applying flags
    #[arg(long)]
    from_json: Option<PathBuf>,
    #[arg(long)]
    fiscal_year: Option<String>,
    #[arg(long)]
    tender_no: Option<String>,
    #[arg(long)]
    notice_date: Option<String>,
    #[arg(long)]
    project_name: Option<String>,
    #[arg(long)]
    ward_no: Option<String>,
    #[arg(long)]
    project_type: Option<String>,
    #[arg(long)]
    project_mode: Option<String>,
    #[arg(long)]
    contract_amount: Option<String>,
    #[arg(long)]
    contract_date: Option<String>,
    #[arg(long)]
    completion_date: Option<String>,
    #[arg(long)]
    physical_progress: Option<String>,
    #[arg(long)]
    project_status: Option<String>,
    #[arg(long)]
    firm_name: Option<String>,
    #[arg(long)]
    firm_address: Option<String>,
    #[arg(long)]
    pan_no: Option<String>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long)]
    ward: Option<String>,
    #[arg(long)]
    fiscal_year: Option<String>,
}

#[derive(Debug, Subcommand)]
enum InstallmentCommand {
    Add(InstallmentArgs),
}

#[derive(Debug, Args)]
struct InstallmentArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    amount: String,
    #[arg(long, default_value = "")]
    payout_date: String,
    #[arg(long, default_value = "")]
    evaluation_amount: String,
    #[arg(long, default_value = "")]
    remarks: String,
}

#[derive(Debug, Subcommand)]
enum GuaranteeCommand {
    Add(GuaranteeArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GuaranteeKindArg {
    Pb,
    Apg,
    Insurance,
}

impl From<GuaranteeKindArg> for GuaranteeKind {
    fn from(value: GuaranteeKindArg) -> Self {
        match value {
            GuaranteeKindArg::Pb => Self::PerformanceBond,
            GuaranteeKindArg::Apg => Self::AdvancePayment,
            GuaranteeKindArg::Insurance => Self::Insurance,
        }
    }
}

#[derive(Debug, Args)]
struct GuaranteeArgs {
    #[arg(long)]
    id: String,
    #[arg(long, value_enum)]
    kind: GuaranteeKindArg,
    #[arg(long, default_value = "")]
    institution: String,
    #[arg(long, default_value = "")]
    number: String,
    #[arg(long, default_value = "")]
    amount: String,
    #[arg(long, default_value = "")]
    expiry: String,
    #[arg(long, default_value = "")]
    remarks: String,
}

#[derive(Debug, Subcommand)]
enum DataCommand {
    Export(ExportArgs),
    Import(ImportArgs),
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long)]
    out: PathBuf,
    /// Backup date as YYYY-MM-DD; defaults to today (UTC)
    #[arg(long)]
    date: Option<String>,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long = "in")]
    input: PathBuf,
    #[command(flatten)]
    confirm: ConfirmArgs,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<Value> {
    serde_json::to_value(value).with_context(|| format!("failed to serialize {what}"))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LedgerConfig::from_path(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config = config.with_storage_dir(dir);
    }
    let api = ContractLedgerApi::new(config)?;

    match cli.command {
        Command::Contract { command } => run_contract(*command, &api),
        Command::Installment { command } => match command {
            InstallmentCommand::Add(args) => run_installment_add(args, &api),
        },
        Command::Guarantee { command } => match command {
            GuaranteeCommand::Add(args) => run_guarantee_add(args, &api),
        },
        Command::Stats => emit_json(to_json(&api.stats()?, "stats")?),
        Command::Dashboard => emit_json(to_json(&api.dashboard()?, "dashboard")?),
        Command::Wards => emit_json(serde_json::json!({ "wards": api.wards()? })),
        Command::FiscalYears => {
            emit_json(serde_json::json!({ "fiscal_years": api.fiscal_years()? }))
        }
        Command::Report(args) => {
            let report = api.report(&ContractId(args.id))?;
            emit_json(to_json(&report, "contract report")?)
        }
        Command::Data { command } => run_data(command, &api),
    }
}

fn run_contract(command: ContractCommand, api: &ContractLedgerApi) -> Result<()> {
    match command {
        ContractCommand::Add(fields) => {
            let record = fields.apply(ContractRecord::default())?;
            let stored = api.add_contract(record)?;
            emit_json(serde_json::json!({ "contract": stored }))
        }
        ContractCommand::Update { id, fields } => {
            let id = ContractId(id);
            let current = api.get_contract(&id)?;
            let stored = api.update_contract(&id, fields.apply(current)?)?;
            emit_json(serde_json::json!({ "contract": stored }))
        }
        ContractCommand::Delete { id, confirm } => {
            let outcome =
                api.delete_contract(&ContractId(id), Confirmation::from_flag(confirm.yes))?;
            emit_json(to_json(&outcome, "delete outcome")?)
        }
        ContractCommand::Show(args) => {
            let record = api.get_contract(&ContractId(args.id))?;
            emit_json(serde_json::json!({ "contract": record }))
        }
        ContractCommand::List(args) => {
            let mut filter = ContractFilter::search(args.search);
            if let Some(ward) = args.ward {
                filter = filter.with_ward(ward);
            }
            if let Some(fiscal_year) = args.fiscal_year {
                filter = filter.with_fiscal_year(fiscal_year);
            }
            let mut view = to_json(&api.list(&filter)?, "contract list")?;
            if let Value::Object(object) = &mut view {
                let options = serde_json::json!(api.ward_filter_options());
                object.insert("ward_options".to_string(), options);
            }
            emit_json(view)
        }
    }
}

fn run_installment_add(args: InstallmentArgs, api: &ContractLedgerApi) -> Result<()> {
    let stored = api.add_installment(
        &ContractId(args.id),
        AddInstallmentRequest {
            amount: args.amount,
            payout_date: args.payout_date,
            evaluation_amount: args.evaluation_amount,
            remarks: args.remarks,
        },
    )?;
    emit_json(serde_json::json!({ "contract": stored }))
}

fn run_guarantee_add(args: GuaranteeArgs, api: &ContractLedgerApi) -> Result<()> {
    let stored = api.add_guarantee(
        &ContractId(args.id),
        AddGuaranteeRequest {
            kind: args.kind.into(),
            institution: args.institution,
            number: args.number,
            amount: args.amount,
            expiry: args.expiry,
            remarks: args.remarks,
        },
    )?;
    emit_json(serde_json::json!({ "contract": stored }))
}

fn run_data(command: DataCommand, api: &ContractLedgerApi) -> Result<()> {
    match command {
        DataCommand::Export(args) => {
            let date = match args.date.as_deref() {
                Some(raw) => parse_date(raw)?,
                None => OffsetDateTime::now_utc().date(),
            };
            let summary = api.export(&args.out, date)?;
            emit_json(to_json(&summary, "export summary")?)
        }
        DataCommand::Import(args) => {
            let outcome = api.import(&args.input, Confirmation::from_flag(args.confirm.yes))?;
            if !outcome.applied {
                tracing::warn!("import not applied; pass --yes to overwrite the current ledger");
            }
            emit_json(to_json(&outcome, "import outcome")?)
        }
    }
}

impl ContractFieldArgs {
    fn apply(self, base: ContractRecord) -> Result<ContractRecord> {
        let mut record = match &self.from_json {
            Some(path) => read_contract_json(path)?,
            None => base,
        };

        let overrides = [
            (self.fiscal_year, &mut record.fiscal_year),
            (self.tender_no, &mut record.tender_no),
            (self.notice_date, &mut record.notice_date),
            (self.project_name, &mut record.project_name),
            (self.ward_no, &mut record.ward_no),
            (self.project_type, &mut record.project_type),
            (self.project_mode, &mut record.project_mode),
            (self.contract_amount, &mut record.contract_amount),
            (self.contract_date, &mut record.contract_date),
            (self.completion_date, &mut record.completion_date),
            (self.physical_progress, &mut record.physical_progress),
            (self.project_status, &mut record.project_status),
            (self.firm_name, &mut record.firm_name),
            (self.firm_address, &mut record.firm_address),
            (self.pan_no, &mut record.pan_no),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        Ok(record)
    }
}

fn read_contract_json(path: &Path) -> Result<ContractRecord> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read contract file {}", path.display()))?;
    let value: Value = serde_json::from_str(&body)
        .with_context(|| format!("contract file {} is not valid JSON", path.display()))?;
    if !value.is_object() {
        return Err(anyhow!("contract file {} MUST hold one JSON object", path.display()));
    }
    serde_json::from_value(value)
        .with_context(|| format!("contract file {} is not a contract record", path.display()))
}

fn parse_date(raw: &str) -> Result<Date> {
    let format = time::format_description::parse("[year]-[month]-[day]")
        .context("failed to build date format")?;
    Date::parse(raw, &format).with_context(|| format!("invalid date (expected YYYY-MM-DD): {raw}"))
}
