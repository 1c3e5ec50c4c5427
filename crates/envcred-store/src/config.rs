//! Editable config object handles.
//!
//! A [`Config`] is a staged copy of one config object: [`Config::get`] and
//! [`Config::set`] work on the in-memory copy, [`Config::save`] writes the
//! whole object back to its backend in one call.

use std::sync::Arc;

use serde_json::Value;

use crate::backend::{ConfigBackend, ConfigData};
use crate::error::StoreResult;

/// Staged, editable view of one config object.
pub struct Config {
    name: String,
    data: ConfigData,
    is_new: bool,
    backend: Arc<dyn ConfigBackend>,
}

impl Config {
    /// Load the config object `name` for editing.
    ///
    /// Objects that were never written start out empty and report
    /// [`is_new`](Self::is_new).
    pub fn editable(backend: Arc<dyn ConfigBackend>, name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        let stored = backend.read(&name)?;
        let is_new = stored.is_none();

        tracing::debug!(name = %name, is_new, "config object loaded");

        Ok(Self {
            name,
            data: stored.unwrap_or_default(),
            is_new,
            backend,
        })
    }

    /// Storage identifier of this object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` until the object has been saved at least once.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Convenience accessor for string fields. Empty strings read as `None`.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Stage a field value. Nothing is persisted until [`save`](Self::save).
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(field.into(), value.into());
        self
    }

    /// Remove a staged field.
    pub fn clear(&mut self, field: &str) -> &mut Self {
        self.data.remove(field);
        self
    }

    /// Every staged field.
    pub fn raw(&self) -> &ConfigData {
        &self.data
    }

    /// Write the staged object to the backend.
    pub fn save(&mut self) -> StoreResult<()> {
        self.backend.write(&self.name, &self.data)?;
        self.is_new = false;
        Ok(())
    }

    /// Re-read the persisted object, dropping anything staged since.
    pub fn reload(&mut self) -> StoreResult<()> {
        let stored = self.backend.read(&self.name)?;
        self.is_new = stored.is_none();
        self.data = stored.unwrap_or_default();
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Field values may hold ciphertext; keep them out of logs.
        f.debug_struct("Config")
            .field("name", &self.name)
            .field("fields", &self.data.keys().collect::<Vec<_>>())
            .field("is_new", &self.is_new)
            .finish()
    }
}
