//! Entity model built from declarative definition maps.
//!
//! Every entity kind is constructed through the same `from_info` protocol:
//!
//! 1. Restrict the raw map to the kind's required keys (extra keys are
//!    dropped, `null` counts as absent).
//! 2. Merge the kind's default values for keys that are still missing.
//! 3. Fail if fewer keys are populated than required.
//! 4. Run the kind's semantic checks (non-empty name, non-empty parameter
//!    type, at least one parameter, value shapes).
//!
//! Failure is signalled with `None`; construction never panics or errors.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A raw definition map as supplied by a provider.
pub type RawDefinition = Map<String, Value>;

/// Keys required by every entity kind.
const BASE_KEYS: [&str; 2] = ["name", "label"];

// ---------------------------------------------------------------------------
// Shared validation
// ---------------------------------------------------------------------------

/// Restrict `raw` to `required` keys, apply `defaults`, and check that every
/// required key ended up populated.
///
/// Returns the sanitised map, or `None` if any required key is missing.
pub fn validate(
    raw: &RawDefinition,
    required: &[&str],
    defaults: &[(&str, Value)],
) -> Option<RawDefinition> {
    let mut info: RawDefinition = raw
        .iter()
        .filter(|(key, value)| required.contains(&key.as_str()) && !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for (key, value) in defaults {
        if required.contains(key) {
            info.entry(*key).or_insert_with(|| value.clone());
        }
    }

    if info.len() < required.len() {
        return None;
    }

    Some(info)
}

/// Extract the `(name, label)` pair shared by all kinds.
fn identity(info: &RawDefinition) -> Option<(String, String)> {
    let name = non_empty_str(info, "name")?;
    let label = info.get("label")?.as_str()?;
    Some((name.to_owned(), label.to_owned()))
}

fn non_empty_str<'a>(info: &'a RawDefinition, key: &str) -> Option<&'a str> {
    info.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn required_keys(extra: &[&'static str]) -> Vec<&'static str> {
    let mut keys = extra.to_vec();
    keys.extend_from_slice(&BASE_KEYS);
    keys
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Discriminant for the entity variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Environment,
    Endpoint,
    Parameter,
    Credential,
}

impl EntityKind {
    /// Kinds gathered from providers by the collector.
    pub const COLLECTED: [EntityKind; 3] = [
        EntityKind::Environment,
        EntityKind::Endpoint,
        EntityKind::Credential,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Endpoint => "endpoint",
            Self::Parameter => "parameter",
            Self::Credential => "credential",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named deployment context such as `PROD` or `UAT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
    label: String,
}

impl Environment {
    pub fn from_info(raw: &RawDefinition) -> Option<Self> {
        let info = validate(raw, &BASE_KEYS, &[])?;
        let (name, label) = identity(&info)?;
        Some(Self { name, label })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A remote service target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    label: String,
    url: String,
    auth_user: String,
    auth_pass: String,
    headers: BTreeMap<String, String>,
}

impl Endpoint {
    fn required_keys() -> Vec<&'static str> {
        required_keys(&["url", "user", "pass", "headers"])
    }

    fn default_values() -> [(&'static str, Value); 3] {
        [
            ("headers", Value::Object(Map::new())),
            ("user", Value::String(String::new())),
            ("pass", Value::String(String::new())),
        ]
    }

    pub fn from_info(raw: &RawDefinition) -> Option<Self> {
        let info = validate(raw, &Self::required_keys(), &Self::default_values())?;
        let (name, label) = identity(&info)?;

        let headers = info
            .get("headers")?
            .as_object()?
            .iter()
            .map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_owned())))
            .collect::<Option<BTreeMap<_, _>>>()?;

        Some(Self {
            name,
            label,
            url: info.get("url")?.as_str()?.to_owned(),
            auth_user: info.get("user")?.as_str()?.to_owned(),
            auth_pass: info.get("pass")?.as_str()?.to_owned(),
            headers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP auth user, empty when not configured.
    pub fn auth_user(&self) -> &str {
        &self.auth_user
    }

    /// HTTP auth password, empty when not configured.
    pub fn auth_pass(&self) -> &str {
        &self.auth_pass
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// A typed field descriptor inside a credential definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    label: String,
    kind: String,
}

impl Parameter {
    pub fn from_info(raw: &RawDefinition) -> Option<Self> {
        let info = validate(raw, &required_keys(&["type"]), &[])?;
        let kind = non_empty_str(&info, "type")?.to_owned();
        let (name, label) = identity(&info)?;
        Some(Self { name, label, kind })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The field type, e.g. `text` or `password`.
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Schema describing which fields a credential instance must carry.
///
/// This is metadata only; the secret values live in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    name: String,
    label: String,
    parameters: Vec<Parameter>,
}

impl Credential {
    /// Build a credential definition.
    ///
    /// Invalid parameter maps are dropped; the definition itself is rejected
    /// when no valid parameter remains.
    pub fn from_info(raw: &RawDefinition) -> Option<Self> {
        let info = validate(raw, &required_keys(&["parameters"]), &[])?;
        let (name, label) = identity(&info)?;

        let parameters: Vec<Parameter> = info
            .get("parameters")?
            .as_array()
            .filter(|list| !list.is_empty())?
            .iter()
            .filter_map(Value::as_object)
            .filter_map(Parameter::from_info)
            .collect();

        if parameters.is_empty() {
            return None;
        }

        Some(Self {
            name,
            label,
            parameters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Any entity produced by the `from_info` protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Environment(Environment),
    Endpoint(Endpoint),
    Parameter(Parameter),
    Credential(Credential),
}

impl Entity {
    /// Dispatch to the per-kind constructor.
    pub fn from_info(kind: EntityKind, raw: &RawDefinition) -> Option<Self> {
        match kind {
            EntityKind::Environment => Environment::from_info(raw).map(Self::Environment),
            EntityKind::Endpoint => Endpoint::from_info(raw).map(Self::Endpoint),
            EntityKind::Parameter => Parameter::from_info(raw).map(Self::Parameter),
            EntityKind::Credential => Credential::from_info(raw).map(Self::Credential),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Environment(_) => EntityKind::Environment,
            Self::Endpoint(_) => EntityKind::Endpoint,
            Self::Parameter(_) => EntityKind::Parameter,
            Self::Credential(_) => EntityKind::Credential,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Environment(e) => e.name(),
            Self::Endpoint(e) => e.name(),
            Self::Parameter(p) => p.name(),
            Self::Credential(c) => c.name(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Environment(e) => e.label(),
            Self::Endpoint(e) => e.label(),
            Self::Parameter(p) => p.label(),
            Self::Credential(c) => c.label(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
