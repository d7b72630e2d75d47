//! Ledger configuration, read from YAML.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use contract_ledger_store_json::{validate_storage_key, DEFAULT_STORAGE_KEY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Directory holding the ledger document
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// File stem of the ledger document inside `storage_dir`
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Wards reported by the per-ward breakdown, `1..=ward_count`
    #[serde(default = "default_ward_count")]
    pub ward_count: u32,
    /// Wards offered by the list filter, `1..=ward_filter_count`
    #[serde(default = "default_ward_filter_count")]
    pub ward_filter_count: u32,
    #[serde(default = "default_dashboard_preview_limit")]
    pub dashboard_preview_limit: usize,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./cms_data")
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_ward_count() -> u32 {
    15
}

fn default_ward_filter_count() -> u32 {
    20
}

fn default_dashboard_preview_limit() -> usize {
    6
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            storage_key: default_storage_key(),
            ward_count: default_ward_count(),
            ward_filter_count: default_ward_filter_count(),
            dashboard_preview_limit: default_dashboard_preview_limit(),
        }
    }
}

impl LedgerConfig {
    /// # Errors
    /// Returns an error when the file cannot be read or does not hold a valid config.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// # Errors
    /// Returns an error when `yaml` does not parse or fails validation.
    pub fn parse(yaml: &str) -> Result<Self> {
        // An empty file is a valid, all-defaults config.
        let config = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str::<Self>(yaml).context("failed to parse config YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.ward_count == 0 {
            return Err(anyhow!("ward_count MUST be at least 1"));
        }
        if self.ward_filter_count == 0 {
            return Err(anyhow!("ward_filter_count MUST be at least 1"));
        }
        validate_storage_key(&self.storage_key)
    }

    #[must_use]
    pub fn with_storage_dir(mut self, storage_dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    #[must_use]
    pub fn document_path(&self) -> PathBuf {
        self.storage_dir.join(format!("{}.json", self.storage_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() -> Result<()> {
        let config = LedgerConfig::parse("")?;
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.ward_count, 15);
        assert_eq!(config.ward_filter_count, 20);
        assert_eq!(config.dashboard_preview_limit, 6);
        assert_eq!(
            config.document_path(),
            PathBuf::from("./cms_data").join("nepal_gov_contracts_v2_data.json")
        );
        Ok(())
    }

    #[test]
    fn partial_config_overrides_only_named_fields() -> Result<()> {
        let config = LedgerConfig::parse("ward_count: 9\nstorage_dir: /var/lib/cms\n")?;
        assert_eq!(config.ward_count, 9);
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/cms"));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(LedgerConfig::parse("ward_count: 0").is_err());
        assert!(LedgerConfig::parse("ward_filter_count: 0").is_err());
        assert!(LedgerConfig::parse("storage_key: ''").is_err());
        assert!(LedgerConfig::parse("storage_key: ../x").is_err());
        assert!(LedgerConfig::parse("unknown_field: 1").is_err());
    }
}
