//! Registration collector and the immutable [`Registry`] snapshot.
//!
//! The collector asks every registered [`DefinitionProvider`] for raw
//! definitions, lets providers and explicit alterations mutate the combined
//! list, then instantiates entities through the `from_info` protocol.
//! Invalid contributions are skipped, never fatal; an optional diagnostic
//! sink receives a [`SkippedDefinition`] for each one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::{Credential, Endpoint, Entity, EntityKind, Environment, RawDefinition};
use crate::provider::DefinitionProvider;

/// Explicit mutation pass over the raw definitions of one kind.
pub type Alteration = Box<dyn Fn(EntityKind, &mut Vec<RawDefinition>) + Send + Sync>;

/// Receives every definition the collector had to skip.
pub type DiagnosticSink = Box<dyn Fn(&SkippedDefinition) + Send + Sync>;

/// A raw definition that failed validation.
#[derive(Debug, Clone)]
pub struct SkippedDefinition {
    pub kind: EntityKind,
    /// Position in the altered list of raw definitions.
    pub index: usize,
    pub definition: RawDefinition,
}

impl SkippedDefinition {
    /// The raw `name` value, if it was a string.
    pub fn name(&self) -> Option<&str> {
        self.definition.get("name").and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Gathers entity definitions from providers.
#[derive(Default)]
pub struct Collector {
    providers: Vec<Box<dyn DefinitionProvider>>,
    alterations: Vec<Alteration>,
    diagnostics: Option<DiagnosticSink>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Providers are queried in registration order.
    pub fn provider(mut self, provider: impl DefinitionProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Register an alteration applied after all provider `alter` hooks.
    pub fn alteration<F>(mut self, alteration: F) -> Self
    where
        F: Fn(EntityKind, &mut Vec<RawDefinition>) + Send + Sync + 'static,
    {
        self.alterations.push(Box::new(alteration));
        self
    }

    /// Install a sink that is told about every skipped definition.
    pub fn on_skip<F>(mut self, sink: F) -> Self
    where
        F: Fn(&SkippedDefinition) + Send + Sync + 'static,
    {
        self.diagnostics = Some(Box::new(sink));
        self
    }

    /// Raw definitions for `kind` after the alteration pass.
    fn raw_definitions(&self, kind: EntityKind) -> Vec<RawDefinition> {
        let mut infos: Vec<RawDefinition> = self
            .providers
            .iter()
            .flat_map(|provider| {
                let infos = provider.definitions(kind);
                tracing::debug!(provider = provider.id(), kind = %kind, count = infos.len(), "collected definitions");
                infos
            })
            .collect();

        for provider in &self.providers {
            provider.alter(kind, &mut infos);
        }
        for alteration in &self.alterations {
            alteration(kind, &mut infos);
        }

        infos
    }

    /// Collect and instantiate every entity of `kind`.
    ///
    /// Entities keep provider order. A later definition with an already
    /// collected name replaces the earlier one in place.
    pub fn collect(&self, kind: EntityKind) -> Vec<Entity> {
        let mut entities: Vec<Entity> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (index, info) in self.raw_definitions(kind).into_iter().enumerate() {
            let Some(entity) = Entity::from_info(kind, &info) else {
                let skipped = SkippedDefinition {
                    kind,
                    index,
                    definition: info,
                };
                tracing::warn!(
                    kind = %kind,
                    index,
                    name = skipped.name().unwrap_or("<missing>"),
                    "skipping invalid definition"
                );
                if let Some(sink) = &self.diagnostics {
                    sink(&skipped);
                }
                continue;
            };

            match positions.get(entity.name()) {
                Some(&pos) => {
                    tracing::debug!(kind = %kind, name = entity.name(), "definition overridden");
                    entities[pos] = entity;
                }
                None => {
                    positions.insert(entity.name().to_owned(), entities.len());
                    entities.push(entity);
                }
            }
        }

        entities
    }

    /// Run the collection for every kind once and freeze the result.
    pub fn build(&self) -> Registry {
        let environments = self
            .collect(EntityKind::Environment)
            .into_iter()
            .filter_map(|e| match e {
                Entity::Environment(env) => Some(env),
                _ => None,
            })
            .collect();
        let endpoints = self
            .collect(EntityKind::Endpoint)
            .into_iter()
            .filter_map(|e| match e {
                Entity::Endpoint(ep) => Some(ep),
                _ => None,
            })
            .collect();
        let credentials = self
            .collect(EntityKind::Credential)
            .into_iter()
            .filter_map(|e| match e {
                Entity::Credential(c) => Some(c),
                _ => None,
            })
            .collect();

        let registry = Registry::new(environments, endpoints, credentials);
        tracing::info!(
            environments = registry.environments.len(),
            endpoints = registry.endpoints.len(),
            credentials = registry.credentials.len(),
            "registry built"
        );
        registry
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Read-only snapshot of every registered entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    environments: Vec<Environment>,
    endpoints: Vec<Endpoint>,
    credentials: Vec<Credential>,
}

impl Registry {
    pub fn new(
        environments: Vec<Environment>,
        endpoints: Vec<Endpoint>,
        credentials: Vec<Credential>,
    ) -> Self {
        Self {
            environments,
            endpoints,
            credentials,
        }
    }

    /// Wrap in an `Arc` for sharing with the vault.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Credential definitions.
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name() == name)
    }

    /// First endpoint with the given name.
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name() == name)
    }

    pub fn credential(&self, name: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.name() == name)
    }
}
