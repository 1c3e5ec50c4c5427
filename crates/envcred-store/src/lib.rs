//! # envcred-store
//!
//! Configuration storage for envcred.
//!
//! Config objects are JSON maps addressed by a dotted storage identifier
//! (`<namespace>.config`, `<namespace>.credentials.<environment>`). A
//! [`ConfigBackend`] persists whole objects; a [`Config`] handle stages
//! field edits and commits them with [`Config::save`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Config (staged get / set / save)        │
//! ├─────────────────────────────────────────┤
//! │  ConfigBackend                           │
//! │    SqliteBackend (rusqlite WAL)          │
//! │    MemoryBackend (Mutex<BTreeMap>)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use envcred_store::{Config, ConfigBackend, MemoryBackend};
//!
//! # fn main() -> envcred_store::StoreResult<()> {
//! let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
//! let mut settings = Config::editable(backend, "envcred.config")?;
//! settings.set("current_environment", "PROD").save()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod migration;

// ── re-exports ───────────────────────────────────────────────────────

pub use backend::{ConfigBackend, ConfigData, MemoryBackend};
pub use config::Config;
pub use db::SqliteBackend;
pub use error::{StoreError, StoreResult};
