//! Storage backends for config objects.
//!
//! A config object is a JSON map addressed by a dotted storage identifier,
//! e.g. `envcred.credentials.PROD`. Backends only know how to read and
//! replace whole objects; field-level access lives in [`Config`](crate::Config).

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Persisted contents of one config object.
pub type ConfigData = Map<String, Value>;

/// Persistent store of config objects.
///
/// Implementations must be `Send + Sync` so handles can move between
/// threads; callers still treat each handle as single-writer.
pub trait ConfigBackend: Send + Sync {
    /// Read a config object, `None` when it was never written.
    fn read(&self, name: &str) -> StoreResult<Option<ConfigData>>;

    /// Replace a config object.
    fn write(&self, name: &str, data: &ConfigData) -> StoreResult<()>;

    /// Names of all objects starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Reject identifiers that cannot address a config object.
pub(crate) fn check_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.starts_with('.') || name.ends_with('.') {
        return Err(StoreError::InvalidArgument(format!(
            "invalid config name `{name}`"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local backend, useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<BTreeMap<String, ConfigData>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> StoreResult<std::sync::MutexGuard<'_, BTreeMap<String, ConfigData>>> {
        self.objects
            .lock()
            .map_err(|e| StoreError::Backend(format!("mutex poisoned: {e}")))
    }
}

impl ConfigBackend for MemoryBackend {
    fn read(&self, name: &str) -> StoreResult<Option<ConfigData>> {
        Ok(self.objects()?.get(name).cloned())
    }

    fn write(&self, name: &str, data: &ConfigData) -> StoreResult<()> {
        check_name(name)?;
        self.objects()?.insert(name.to_owned(), data.clone());
        tracing::debug!(name, fields = data.len(), "config object written");
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .objects()?
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
