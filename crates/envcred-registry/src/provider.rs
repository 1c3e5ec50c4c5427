//! Definition providers.
//!
//! A provider contributes raw definition maps for each [`EntityKind`] and may
//! optionally alter the combined list before entities are instantiated. The
//! collector queries providers in registration order.

use serde::Deserialize;
use serde_json::Value;

use crate::entity::{EntityKind, RawDefinition};

/// Source of raw entity definitions.
pub trait DefinitionProvider: Send + Sync {
    /// Identifier used in log output.
    fn id(&self) -> &str;

    /// Raw definitions this provider contributes for `kind`.
    fn definitions(&self, kind: EntityKind) -> Vec<RawDefinition>;

    /// Mutate the collected list of definitions for `kind`.
    ///
    /// Runs after every provider has contributed. The default does nothing.
    fn alter(&self, _kind: EntityKind, _definitions: &mut Vec<RawDefinition>) {}
}

/// Static registration table.
///
/// # Example
///
/// ```rust
/// # use envcred_registry::{DefinitionProvider, EntityKind, StaticProvider};
/// let provider = StaticProvider::from_json(
///     "acme",
///     r#"{"environments": [{"name": "PROD", "label": "Production"}]}"#,
/// )
/// .unwrap();
///
/// assert_eq!(provider.definitions(EntityKind::Environment).len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    id: String,
    environments: Vec<RawDefinition>,
    endpoints: Vec<RawDefinition>,
    credentials: Vec<RawDefinition>,
}

#[derive(Deserialize, Default)]
struct Table {
    #[serde(default)]
    environments: Vec<Value>,
    #[serde(default)]
    endpoints: Vec<Value>,
    #[serde(default)]
    credentials: Vec<Value>,
}

impl StaticProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON table with optional `environments`, `endpoints` and
    /// `credentials` arrays. Entries that are not objects are dropped.
    pub fn from_json(id: impl Into<String>, json: &str) -> serde_json::Result<Self> {
        let table: Table = serde_json::from_str(json)?;
        let id = id.into();

        let objects = |values: Vec<Value>, kind: EntityKind| -> Vec<RawDefinition> {
            values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(map) => Some(map),
                    other => {
                        tracing::warn!(provider = %id, kind = %kind, value = %other, "ignoring non-object definition");
                        None
                    }
                })
                .collect()
        };

        let environments = objects(table.environments, EntityKind::Environment);
        let endpoints = objects(table.endpoints, EntityKind::Endpoint);
        let credentials = objects(table.credentials, EntityKind::Credential);

        Ok(Self {
            id,
            environments,
            endpoints,
            credentials,
        })
    }

    /// Add a definition for `kind`. Non-object values are ignored.
    pub fn with(mut self, kind: EntityKind, definition: Value) -> Self {
        let Value::Object(map) = definition else {
            tracing::warn!(provider = %self.id, kind = %kind, "ignoring non-object definition");
            return self;
        };

        match kind {
            EntityKind::Environment => self.environments.push(map),
            EntityKind::Endpoint => self.endpoints.push(map),
            EntityKind::Credential => self.credentials.push(map),
            EntityKind::Parameter => {
                tracing::warn!(provider = %self.id, "parameters are declared inside credentials");
            }
        }
        self
    }

    pub fn environment(self, definition: Value) -> Self {
        self.with(EntityKind::Environment, definition)
    }

    pub fn endpoint(self, definition: Value) -> Self {
        self.with(EntityKind::Endpoint, definition)
    }

    pub fn credential(self, definition: Value) -> Self {
        self.with(EntityKind::Credential, definition)
    }
}

impl DefinitionProvider for StaticProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn definitions(&self, kind: EntityKind) -> Vec<RawDefinition> {
        match kind {
            EntityKind::Environment => self.environments.clone(),
            EntityKind::Endpoint => self.endpoints.clone(),
            EntityKind::Credential => self.credentials.clone(),
            EntityKind::Parameter => Vec::new(),
        }
    }
}
