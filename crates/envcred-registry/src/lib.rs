//! Entity model and registration collector for envcred.
//!
//! Providers contribute raw definition maps for environments, endpoints and
//! credential definitions. The [`Collector`] validates them into typed
//! entities and freezes the result into a [`Registry`] that the vault reads
//! for the rest of the process lifetime.
//!
//! # Modules
//!
//! - [`entity`] - entity variants and the shared `from_info` validation.
//! - [`provider`] - the [`DefinitionProvider`] seam and a static table.
//! - [`collector`] - collection, alteration, dedup, and the registry.
//!
//! # Quick Start
//!
//! ```rust
//! use envcred_registry::{Collector, StaticProvider};
//! use serde_json::json;
//!
//! let registry = Collector::new()
//!     .provider(
//!         StaticProvider::new("acme")
//!             .environment(json!({"name": "PROD", "label": "Production"}))
//!             .endpoint(json!({"name": "billing", "label": "Billing", "url": "https://billing"})),
//!     )
//!     .build();
//!
//! assert_eq!(registry.environments().len(), 1);
//! assert_eq!(registry.endpoint("billing").unwrap().auth_user(), "");
//! ```

pub mod collector;
pub mod entity;
pub mod provider;

pub use collector::{Alteration, Collector, DiagnosticSink, Registry, SkippedDefinition};
pub use entity::{
    Credential, Endpoint, Entity, EntityKind, Environment, Parameter, RawDefinition, validate,
};
pub use provider::{DefinitionProvider, StaticProvider};
