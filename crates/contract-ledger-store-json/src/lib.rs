//! Snapshot store for the contract ledger.
//!
//! The whole ledger lives in one JSON document. Readers hold an
//! [`Arc`]-shared, immutable snapshot; every mutation builds the next snapshot,
//! persists it, and only then swaps it in and notifies subscribers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use contract_ledger_core::{
    duplicate_contract_ids, parse_document, to_document, ContractId, ContractRecord,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Date, OffsetDateTime};
use ulid::Ulid;

/// Storage key the ledger document has always been kept under.
pub const DEFAULT_STORAGE_KEY: &str = "nepal_gov_contracts_v2_data";

pub type Snapshot = Arc<Vec<ContractRecord>>;

type Listener = Box<dyn FnMut(&Snapshot, u64)>;

/// Where the serialized ledger document is kept.
pub trait SnapshotBackend {
    /// The stored document, or `None` when nothing has been stored yet.
    ///
    /// # Errors
    /// Returns an error when the backing medium cannot be read.
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored document.
    ///
    /// # Errors
    /// Returns an error when the document cannot be written.
    fn save(&mut self, document: &str) -> Result<()>;

    fn describe(&self) -> String;
}

/// One `<key>.json` file in a storage directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    key: String,
}

impl FileBackend {
    /// # Errors
    /// Returns an error when `key` is empty or is not a plain file stem.
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        validate_storage_key(&key)?;
        Ok(Self {
            dir: dir.into(),
            key,
        })
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("failed to read ledger document {}", path.display()))
    }

    fn save(&mut self, document: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create storage directory {}", self.dir.display())
        })?;

        let path = self.path();
        let staging = self.dir.join(format!(".{}.{}.tmp", self.key, Ulid::new()));
        fs::write(&staging, document)
            .with_context(|| format!("failed to write staging file {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("failed to replace ledger document {}", path.display()))
    }

    fn describe(&self) -> String {
        self.path().display().to_string()
    }
}

/// In-process backend, used by tests and by callers that never persist.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    document: Option<String>,
    saves: usize,
}

impl MemoryBackend {
    #[must_use]
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
            saves: 0,
        }
    }

    #[must_use]
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    #[must_use]
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl SnapshotBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.document.clone())
    }

    fn save(&mut self, document: &str) -> Result<()> {
        self.document = Some(document.to_string());
        self.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Caller's answer to a destructive action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed,
    Declined,
}

impl Confirmation {
    #[must_use]
    pub fn from_flag(confirmed: bool) -> Self {
        if confirmed {
            Self::Confirmed
        } else {
            Self::Declined
        }
    }

    #[must_use]
    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: ContractId,
    pub applied: bool,
    pub removed: usize,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportOutcome {
    pub applied: bool,
    pub imported_records: usize,
    pub previous_records: usize,
    pub duplicate_ids: Vec<ContractId>,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: String,
    pub file_name: String,
    pub records: usize,
    pub sha256: String,
    pub exported_at: String,
}

/// Backup file name for an export taken on `date`: `cms_backup_YYYY-MM-DD.json`.
#[must_use]
pub fn export_file_name(date: Date) -> String {
    format!("cms_backup_{:04}-{:02}-{:02}.json", date.year(), u8::from(date.month()), date.day())
}

/// Storage keys become file stems, so they must not carry path syntax.
///
/// # Errors
/// Returns an error describing why `key` cannot be used.
pub fn validate_storage_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(anyhow!("storage key MUST be non-empty"));
    }
    if key.starts_with('.') || key.contains(['/', '\\']) {
        return Err(anyhow!("storage key MUST be a plain file stem: {key}"));
    }
    Ok(())
}

pub struct ContractStore<B: SnapshotBackend> {
    backend: B,
    snapshot: Snapshot,
    revision: u64,
    load_warning: Option<String>,
    listeners: Vec<Listener>,
}

impl<B: SnapshotBackend> ContractStore<B> {
    /// Load the current document from `backend`.
    ///
    /// A missing document yields an empty ledger. A document that cannot be
    /// parsed also yields an empty ledger, with the reason kept in
    /// [`ContractStore::load_warning`]; the stored bytes are left untouched
    /// until the next mutation overwrites them.
    ///
    /// # Errors
    /// Returns an error only when the backend itself cannot be read.
    pub fn open(backend: B) -> Result<Self> {
        let stored = backend
            .load()
            .with_context(|| format!("failed to load ledger from {}", backend.describe()))?;

        let (records, load_warning) = match stored {
            None => (Vec::new(), None),
            Some(raw) => match parse_document(&raw) {
                Ok(records) => (records, None),
                Err(err) => {
                    tracing::warn!(
                        location = %backend.describe(),
                        error = %err,
                        "stored ledger document is unreadable; starting empty"
                    );
                    (Vec::new(), Some(err.to_string()))
                }
            },
        };

        tracing::debug!(location = %backend.describe(), records = records.len(), "opened ledger");
        Ok(Self {
            backend,
            snapshot: Arc::new(records),
            revision: 0,
            load_warning,
            listeners: Vec::new(),
        })
    }

    /// Current snapshot. Holding it across mutations is safe; it never changes.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.snapshot)
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// First record carrying `id`.
    #[must_use]
    pub fn get(&self, id: &ContractId) -> Option<&ContractRecord> {
        self.snapshot.iter().find(|record| &record.id == id)
    }

    /// Register a callback run after every published snapshot.
    pub fn subscribe(&mut self, listener: impl FnMut(&Snapshot, u64) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Append a new contract under a freshly generated id.
    ///
    /// # Errors
    /// Returns an error when the record is invalid or cannot be persisted.
    pub fn add(&mut self, mut record: ContractRecord) -> Result<ContractRecord> {
        record.id = ContractId::generate();
        record.assign_missing_entry_ids();
        record.validate()?;

        let mut next = self.snapshot.as_ref().clone();
        next.push(record.clone());
        self.publish(next)?;
        tracing::info!(id = %record.id, "added contract");
        Ok(record)
    }

    /// Replace every record carrying `id` with `replacement`, keeping the id.
    ///
    /// # Errors
    /// Returns an error when no record has `id`, the replacement is invalid,
    /// or the result cannot be persisted.
    pub fn update(
        &mut self,
        id: &ContractId,
        mut replacement: ContractRecord,
    ) -> Result<ContractRecord> {
        if self.get(id).is_none() {
            return Err(anyhow!("contract not found: {id}"));
        }
        replacement.id = id.clone();
        replacement.assign_missing_entry_ids();
        replacement.validate()?;

        let next = self
            .snapshot
            .iter()
            .map(|record| if &record.id == id { replacement.clone() } else { record.clone() })
            .collect::<Vec<_>>();
        self.publish(next)?;
        tracing::info!(id = %id, "updated contract");
        Ok(replacement)
    }

    /// Apply `edit` to a copy of the record carrying `id` and store the result.
    ///
    /// # Errors
    /// Same as [`ContractStore::update`].
    pub fn edit(
        &mut self,
        id: &ContractId,
        edit: impl FnOnce(&mut ContractRecord),
    ) -> Result<ContractRecord> {
        let mut record = self.get(id).cloned().ok_or_else(|| anyhow!("contract not found: {id}"))?;
        edit(&mut record);
        self.update(id, record)
    }

    /// Remove every record carrying `id`. Declined confirmation changes nothing.
    ///
    /// # Errors
    /// Returns an error when the result cannot be persisted.
    pub fn delete(&mut self, id: &ContractId, confirmation: Confirmation) -> Result<DeleteOutcome> {
        if !confirmation.is_confirmed() {
            tracing::info!(id = %id, "delete declined");
            return Ok(DeleteOutcome {
                id: id.clone(),
                applied: false,
                removed: 0,
                revision: self.revision,
            });
        }

        let next = self
            .snapshot
            .iter()
            .filter(|record| &record.id != id)
            .cloned()
            .collect::<Vec<_>>();
        let removed = self.snapshot.len() - next.len();
        if removed > 0 {
            self.publish(next)?;
        }
        tracing::info!(id = %id, removed, "deleted contract");
        Ok(DeleteOutcome {
            id: id.clone(),
            applied: true,
            removed,
            revision: self.revision,
        })
    }

    /// Replace the whole ledger. Used by import.
    ///
    /// # Errors
    /// Returns an error when the new snapshot cannot be persisted.
    pub fn replace_all(
        &mut self,
        records: Vec<ContractRecord>,
        confirmation: Confirmation,
    ) -> Result<ImportOutcome> {
        let previous_records = self.snapshot.len();
        let duplicate_ids = duplicate_contract_ids(&records);
        let imported_records = records.len();

        if !confirmation.is_confirmed() {
            tracing::info!(imported_records, "import declined");
            return Ok(ImportOutcome {
                applied: false,
                imported_records: 0,
                previous_records,
                duplicate_ids,
                revision: self.revision,
            });
        }

        if !duplicate_ids.is_empty() {
            tracing::warn!(
                duplicates = duplicate_ids.len(),
                "imported document repeats contract ids"
            );
        }
        self.publish(records)?;
        tracing::info!(imported_records, previous_records, "replaced ledger");
        Ok(ImportOutcome {
            applied: true,
            imported_records,
            previous_records,
            duplicate_ids,
            revision: self.revision,
        })
    }

    /// Parse `raw` and, when confirmed, replace the ledger with it.
    ///
    /// The document is parsed before confirmation is consulted, so an invalid
    /// document is rejected without touching the ledger either way.
    ///
    /// # Errors
    /// Returns an error when `raw` is not a valid ledger document or the new
    /// snapshot cannot be persisted.
    pub fn import_document(
        &mut self,
        raw: &str,
        confirmation: Confirmation,
    ) -> Result<ImportOutcome> {
        let records = parse_document(raw)?;
        self.replace_all(records, confirmation)
    }

    /// # Errors
    /// Returns an error when the file cannot be read, or as for
    /// [`ContractStore::import_document`].
    pub fn import_file(
        &mut self,
        path: &Path,
        confirmation: Confirmation,
    ) -> Result<ImportOutcome> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read import file {}", path.display()))?;
        self.import_document(&raw, confirmation)
            .with_context(|| format!("failed to import {}", path.display()))
    }

    /// The current snapshot as a document.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be serialized.
    pub fn export_document(&self) -> Result<String> {
        Ok(to_document(&self.snapshot)?)
    }

    /// Write the current snapshot to `out_dir` under the backup name for `date`.
    ///
    /// # Errors
    /// Returns an error when the directory or file cannot be written.
    pub fn export_to_dir(&self, out_dir: &Path, date: Date) -> Result<ExportSummary> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create export directory {}", out_dir.display()))?;

        let document = self.export_document()?;
        let file_name = export_file_name(date);
        let path = out_dir.join(&file_name);
        fs::write(&path, document.as_bytes())
            .with_context(|| format!("failed to write export file {}", path.display()))?;

        let summary = ExportSummary {
            path: path.display().to_string(),
            file_name,
            records: self.snapshot.len(),
            sha256: sha256_hex(document.as_bytes()),
            exported_at: now_rfc3339()?,
        };
        tracing::info!(path = %summary.path, records = summary.records, "exported ledger");
        Ok(summary)
    }

    fn publish(&mut self, next: Vec<ContractRecord>) -> Result<()> {
        let document = to_document(&next)?;
        self.backend
            .save(&document)
            .with_context(|| format!("failed to persist ledger to {}", self.backend.describe()))?;

        self.snapshot = Arc::new(next);
        self.revision += 1;
        self.load_warning = None;
        tracing::debug!(
            revision = self.revision,
            records = self.snapshot.len(),
            "published snapshot"
        );

        let snapshot = Arc::clone(&self.snapshot);
        let revision = self.revision;
        for listener in &mut self.listeners {
            listener(&snapshot, revision);
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}
