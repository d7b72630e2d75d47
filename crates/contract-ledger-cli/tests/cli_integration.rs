use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

use jsonschema::JSONSchema;
use serde_json::{json, Value};

static SANDBOX_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Scratch directory for one test, removed when dropped.
struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    fn new(label: &str) -> Self {
        let seq = SANDBOX_SEQ.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir()
            .join(format!("contract-ledger-cli-{label}-{}-{seq}", std::process::id()));
        if root.exists() {
            let _ = fs::remove_dir_all(&root);
        }
        fs::create_dir_all(&root)
            .unwrap_or_else(|err| panic!("cannot create sandbox {}: {err}", root.display()));
        Self { root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn write(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|err| panic!("cannot create {}: {err}", parent.display()));
        }
        fs::write(&path, body)
            .unwrap_or_else(|err| panic!("cannot write {}: {err}", path.display()));
        path
    }

    /// A ledger whose storage directory lives inside the sandbox.
    fn ledger(&self, name: &str) -> Ledger {
        Ledger {
            data_dir: self.path(name),
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Runs `cms` with `--data-dir` pointing at one storage directory.
struct Ledger {
    data_dir: PathBuf,
}

impl Ledger {
    fn run<I, S>(&self, args: I) -> Output
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(env!("CARGO_BIN_EXE_cms"));
        command.arg("--data-dir").arg(&self.data_dir).args(args);
        invoke(&mut command)
    }

    fn json<I, S>(&self, args: I) -> Value
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        envelope(&self.run(args))
    }

    fn count(&self) -> Value {
        self.json(["stats"])["count"].clone()
    }

    fn add_contract(&self, fields: &[(&str, &str)]) -> String {
        let mut args = vec!["contract".to_string(), "add".to_string()];
        for (flag, value) in fields {
            args.push(format!("--{flag}"));
            args.push((*value).to_string());
        }
        let added = self.json(&args);
        added["contract"]["id"]
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| panic!("`contract add` returned no id: {added}"))
    }

    /// A finished road in ward 3 carrying one 50000 installment, and an
    /// ongoing bridge in ward 5. Returns `(road, bridge)` ids.
    fn seed(&self) -> (String, String) {
        let road = self.add_contract(&[
            ("fiscal-year", "2080/081"),
            ("tender-no", "NCB-01/080"),
            ("project-name", "Road Upgrade"),
            ("ward-no", "3"),
            ("contract-amount", "100000"),
            ("physical-progress", "100"),
            ("firm-name", "Himal Builders"),
        ]);
        let bridge = self.add_contract(&[
            ("fiscal-year", "2081/082"),
            ("tender-no", "NCB-07/081"),
            ("project-name", "Bridge"),
            ("ward-no", "5"),
            ("contract-amount", "200000"),
            ("physical-progress", "40"),
            ("firm-name", "Everest Construction"),
        ]);
        self.json([
            "installment",
            "add",
            "--id",
            road.as_str(),
            "--amount",
            "50000",
            "--payout-date",
            "2081-01-15",
        ]);
        (road, bridge)
    }
}

fn invoke(command: &mut Command) -> Output {
    command.output().unwrap_or_else(|err| panic!("cannot spawn cms: {err}"))
}

/// Parses a successful run's stdout and checks the contract version tag.
fn envelope(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "cms exited with {}\nstdout:\n{stdout}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let value: Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|err| panic!("cms printed non-JSON ({err}):\n{stdout}"));
    assert_eq!(value["contract_version"], "cli.v1");
    value
}

fn rows(value: &Value, key: &str) -> Vec<Value> {
    value[key].as_array().cloned().unwrap_or_else(|| panic!("`{key}` is not an array: {value}"))
}

fn conforms(schema: &str, instance: &Value) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../contracts/v1/schemas")
        .join(format!("{schema}.schema.json"));
    let body = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("cannot read schema {}: {err}", path.display()));
    let document: Value = serde_json::from_str(&body)
        .unwrap_or_else(|err| panic!("schema {} is not JSON: {err}", path.display()));
    let validator = JSONSchema::compile(&document)
        .unwrap_or_else(|err| panic!("schema {schema} does not compile: {err}"));
    if let Err(errors) = validator.validate(instance) {
        let messages: Vec<String> = errors.map(|error| error.to_string()).collect();
        panic!("output breaks the {schema} schema:\n{}\n{instance}", messages.join("\n"));
    };
}

#[test]
fn stats_and_dashboard_summarise_the_ledger() {
    let sandbox = Sandbox::new("stats");
    let ledger = sandbox.ledger("data");
    ledger.seed();

    let stats = ledger.json(["stats"]);
    conforms("stats", &stats);
    assert_eq!(stats["count"], 2);
    assert_eq!(stats["total_contract_amount"], "300000");
    assert_eq!(stats["total_paid_amount"], "50000");
    assert_eq!(stats["active_projects"], 1);
    assert_eq!(stats["financial_progress_label"], "16.7");

    let dashboard = ledger.json(["dashboard"]);
    conforms("dashboard", &dashboard);
    assert_eq!(dashboard["wards"], json!([{ "ward": 3, "count": 1 }, { "ward": 5, "count": 1 }]));

    let years = ledger.json(["fiscal-years"]);
    assert_eq!(years["fiscal_years"], json!(["2081/082", "2080/081"]));
    assert_eq!(rows(&ledger.json(["wards"]), "wards").len(), 2);
}

#[test]
fn list_applies_search_ward_and_fiscal_year_filters() {
    let sandbox = Sandbox::new("list");
    let ledger = sandbox.ledger("data");
    let (road, bridge) = ledger.seed();

    let everything = ledger.json(["contract", "list"]);
    conforms("list", &everything);
    assert_eq!(everything["matched_records"], 2);
    assert_eq!(rows(&everything, "ward_options").len(), 20);

    let search = ledger.json(["contract", "list", "--search", "ROAD"]);
    assert_eq!(search["matched_records"], 1);
    let found = rows(&search, "rows");
    assert_eq!(found[0]["id"], road);
    assert_eq!(found[0]["status"], "completed");
    assert_eq!(found[0]["financial_progress_label"], "50.0");

    let by_firm = ledger.json(["contract", "list", "--search", "everest"]);
    assert_eq!(rows(&by_firm, "rows")[0]["id"], bridge);

    let ward = ledger.json(["contract", "list", "--ward", "5"]);
    assert_eq!(ward["matched_records"], 1);

    let none = ledger.json(["contract", "list", "--fiscal-year", "2079/080"]);
    assert_eq!(none["matched_records"], 0);
    assert_eq!(none["total_records"], 2);
}

#[test]
fn delete_without_yes_changes_nothing() {
    let sandbox = Sandbox::new("delete");
    let ledger = sandbox.ledger("data");
    let (road, _) = ledger.seed();

    let declined = ledger.json(["contract", "delete", "--id", road.as_str()]);
    conforms("delete", &declined);
    assert_eq!(declined["applied"], false);
    assert_eq!(ledger.count(), 2);

    let applied = ledger.json(["contract", "delete", "--id", road.as_str(), "--yes"]);
    conforms("delete", &applied);
    assert_eq!(applied["applied"], true);
    assert_eq!(applied["removed"], 1);
    assert_eq!(ledger.count(), 1);

    assert!(!ledger.run(["contract", "show", "--id", road.as_str()]).status.success());
}

#[test]
fn export_then_import_restores_an_identical_ledger() {
    let sandbox = Sandbox::new("round-trip");
    let source = sandbox.ledger("source");
    let target = sandbox.ledger("target");
    let backups = sandbox.path("backups");
    let (road, _) = source.seed();

    source.json([
        "guarantee",
        "add",
        "--id",
        road.as_str(),
        "--kind",
        "pb",
        "--institution",
        "Nabil Bank",
        "--number",
        "PB-9",
        "--amount",
        "5000",
    ]);

    let mut export_args = vec![OsStr::new("data"), OsStr::new("export"), OsStr::new("--out")];
    export_args.extend([backups.as_os_str(), OsStr::new("--date"), OsStr::new("2024-03-05")]);
    let export = source.json(export_args);
    conforms("export", &export);
    assert_eq!(export["file_name"], "cms_backup_2024-03-05.json");
    assert_eq!(export["records"], 2);
    let backup = backups.join("cms_backup_2024-03-05.json");
    assert!(backup.is_file());

    let import = |confirm: bool| {
        let mut args = vec![OsStr::new("data"), OsStr::new("import"), OsStr::new("--in")];
        args.push(backup.as_os_str());
        if confirm {
            args.push(OsStr::new("--yes"));
        }
        target.json(args)
    };

    let declined = import(false);
    conforms("import", &declined);
    assert_eq!(declined["applied"], false);
    assert_eq!(target.count(), 0);

    let applied = import(true);
    conforms("import", &applied);
    assert_eq!(applied["applied"], true);
    assert_eq!(applied["imported_records"], 2);

    let listing = ["contract", "list"];
    assert_eq!(source.json(listing)["rows"], target.json(listing)["rows"]);

    let report = target.json(["report", "--id", road.as_str()]);
    let guarantees = rows(&report, "guarantees");
    assert_eq!(guarantees.len(), 1);
    assert_eq!(guarantees[0]["label"], "PB");
    assert_eq!(report["installment_total"], "50000");
}

#[test]
fn invalid_import_is_rejected_and_ledger_is_kept() {
    let sandbox = Sandbox::new("bad-import");
    let ledger = sandbox.ledger("data");
    ledger.seed();
    let bad = sandbox.write("bad.json", r#"{"id": "not-an-array"}"#);

    let mut args = vec![OsStr::new("data"), OsStr::new("import"), OsStr::new("--in")];
    args.extend([bad.as_os_str(), OsStr::new("--yes")]);
    assert!(!ledger.run(args).status.success());
    assert_eq!(ledger.count(), 2);
}

#[test]
fn unreadable_ledger_surfaces_a_load_warning() {
    let sandbox = Sandbox::new("corrupt");
    let data = sandbox.path("ledger");
    sandbox.write("ledger/office_ledger.json", "[{");
    let config = sandbox.write(
        "cms.yaml",
        &format!(
            "storage_dir: {}\nstorage_key: office_ledger\ndashboard_preview_limit: 2\n",
            data.display()
        ),
    );

    let mut command = Command::new(env!("CARGO_BIN_EXE_cms"));
    command.arg("--config").arg(&config).arg("dashboard");
    let dashboard = envelope(&invoke(&mut command));
    conforms("dashboard", &dashboard);
    assert!(dashboard["load_warning"].is_string());
    assert_eq!(dashboard["stats"]["count"], 0);
}
