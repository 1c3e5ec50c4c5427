//! Credential instance data and its canonical serialization.
//!
//! The canonical form of a [`CredentialValue`] is a compact JSON object with
//! keys in sorted order and the endpoint reduced to its name under the
//! reserved `endpoint` key. The same input always produces the same string,
//! which makes it the unit of both encryption and change detection.

use std::collections::BTreeMap;

use envcred_registry::Endpoint;
use serde_json::{Map, Value};

use crate::error::{Result, VaultError};

/// Reserved key carrying the endpoint name in the canonical form.
pub const ENDPOINT_KEY: &str = "endpoint";

/// Endpoint attached to a credential value.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointRef {
    /// Resolved against the registry.
    Resolved(Endpoint),
    /// A bare name, as supplied by a caller. Persisted as-is.
    Named(String),
}

impl EndpointRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Resolved(endpoint) => endpoint.name(),
            Self::Named(name) => name,
        }
    }

    /// The resolved endpoint, if this reference has one.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Resolved(endpoint) => Some(endpoint),
            Self::Named(_) => None,
        }
    }
}

impl From<Endpoint> for EndpointRef {
    fn from(endpoint: Endpoint) -> Self {
        Self::Resolved(endpoint)
    }
}

impl From<&str> for EndpointRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

/// Field data for one credential in one environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialValue {
    fields: BTreeMap<String, Value>,
    endpoint: Option<EndpointRef>,
}

/// Decoded canonical form, before the endpoint name is resolved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredValue {
    pub fields: BTreeMap<String, Value>,
    pub endpoint: Option<String>,
}

impl CredentialValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set_field`](Self::set_field).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Builder-style [`set_endpoint`](Self::set_endpoint).
    pub fn with_endpoint(mut self, endpoint: impl Into<EndpointRef>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set a field value.
    ///
    /// The `endpoint` key is reserved: a string sets a named endpoint
    /// reference, `null` clears it, anything else is ignored.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        if name != ENDPOINT_KEY {
            self.fields.insert(name, value);
            return;
        }

        match value {
            Value::String(endpoint) => self.endpoint = Some(EndpointRef::Named(endpoint)),
            Value::Null => self.endpoint = None,
            other => tracing::warn!(value = %other, "ignoring non-string endpoint reference"),
        }
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn set_endpoint(&mut self, endpoint: Option<EndpointRef>) {
        self.endpoint = endpoint;
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String field accessor.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn endpoint(&self) -> Option<&EndpointRef> {
        self.endpoint.as_ref()
    }

    /// Canonical serialization with the endpoint reduced to its name.
    pub fn to_canonical(&self) -> Result<String> {
        let mut object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let endpoint = self
            .endpoint
            .as_ref()
            .map_or(Value::Null, |e| Value::String(e.name().to_owned()));
        object.insert(ENDPOINT_KEY.to_owned(), endpoint);

        Ok(serde_json::to_string(&object)?)
    }

    pub(crate) fn from_parts(fields: BTreeMap<String, Value>, endpoint: Option<EndpointRef>) -> Self {
        Self { fields, endpoint }
    }
}

/// Parse a canonical string.
///
/// `null` and `{}` decode to `None`, the same as an empty stored entry. Any
/// other non-object payload, or a non-string endpoint, is a malformed record.
pub(crate) fn parse_canonical(
    plaintext: &str,
    environment: &str,
    credential: &str,
) -> Result<Option<StoredValue>> {
    let malformed = |reason: String| VaultError::MalformedRecord {
        environment: environment.to_owned(),
        credential: credential.to_owned(),
        reason,
    };

    let mut object = match serde_json::from_str::<Value>(plaintext)
        .map_err(|e| malformed(e.to_string()))?
    {
        Value::Null => return Ok(None),
        Value::Object(object) if object.is_empty() => return Ok(None),
        Value::Object(object) => object,
        other => return Err(malformed(format!("expected an object, found `{other}`"))),
    };

    let endpoint = match object.remove(ENDPOINT_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name),
        Some(other) => return Err(malformed(format!("endpoint must be a string, found `{other}`"))),
    };

    Ok(Some(StoredValue {
        fields: object.into_iter().collect(),
        endpoint,
    }))
}
