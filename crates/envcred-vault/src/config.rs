//! Vault configuration.
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! namespace = "envcred"
//! decrypt_failure = "abort"      # or "skip"
//! database_path = "data/envcred.db"
//!
//! [defaults]
//! current_environment = "UAT"
//! encrypt_profile = "default"
//! ```
//!
//! `[defaults]` only seeds the persisted settings object: values already
//! saved there win.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use envcred_store::{ConfigBackend, MemoryBackend, SqliteBackend};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// What to do when one stored credential cannot be decrypted or parsed
/// during load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecryptFailurePolicy {
    /// Fail the whole load.
    #[default]
    Abort,
    /// Log the failure and cache the entry as empty.
    Skip,
}

/// Seeds for the persisted settings object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDefaults {
    pub current_environment: Option<String>,
    pub encrypt_profile: Option<String>,
}

/// Configuration for a [`CredentialsManager`](crate::CredentialsManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Prefix of every storage identifier the vault touches.
    pub namespace: String,
    pub decrypt_failure: DecryptFailurePolicy,
    /// SQLite file used by [`open_backend`](Self::open_backend). In-memory
    /// storage when unset.
    pub database_path: Option<PathBuf>,
    pub defaults: SettingsDefaults,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            namespace: "envcred".into(),
            decrypt_failure: DecryptFailurePolicy::default(),
            database_path: None,
            defaults: SettingsDefaults::default(),
        }
    }
}

impl VaultConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), namespace = %config.namespace, "vault config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ns = &self.namespace;
        if ns.is_empty() || ns.starts_with('.') || ns.ends_with('.') {
            return Err(VaultError::InvalidConfig {
                reason: format!("namespace `{ns}` must be non-empty and not start or end with `.`"),
            });
        }
        Ok(())
    }

    /// Open the storage backend this config points at.
    pub fn open_backend(&self) -> Result<Arc<dyn ConfigBackend>> {
        let backend: Arc<dyn ConfigBackend> = match &self.database_path {
            Some(path) => Arc::new(SqliteBackend::open(path)?),
            None => Arc::new(MemoryBackend::new()),
        };
        Ok(backend)
    }

    /// Storage identifier of the settings object.
    pub fn settings_name(&self) -> String {
        format!("{}.config", self.namespace)
    }

    /// Storage identifier of an environment's credentials object.
    pub fn storage_name(&self, environment: &str) -> String {
        format!("{}.credentials.{environment}", self.namespace)
    }
}
