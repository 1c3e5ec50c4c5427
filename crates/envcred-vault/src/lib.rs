//! Environment-scoped, encrypted credential store for envcred.
//!
//! Credentials are named API credentials whose field values differ per
//! environment (dev, UAT, production). This crate caches them in memory,
//! persists one config object per environment through `envcred-store`, and
//! encrypts every value at rest under a named encryption profile.
//!
//! # Modules
//!
//! - [`manager`] - the [`CredentialsManager`]: load, get/set, save.
//! - [`value`] - credential instance data and its canonical form.
//! - [`profile`] - encryption profiles and the encryption service seam.
//! - [`crypto`] - AES-256-GCM encryption/decryption, PBKDF2 key derivation.
//! - [`config`] - TOML vault configuration.
//! - [`error`] - Unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use envcred_registry::{Collector, StaticProvider};
//! use envcred_vault::{
//!     CredentialValue, CredentialsManager, EncryptionProfile, MemoryProfileRegistry, VaultConfig,
//! };
//!
//! # fn example() -> envcred_vault::Result<()> {
//! let definitions = std::fs::read_to_string("definitions.json")?;
//! let registry = Collector::new()
//!     .provider(StaticProvider::from_json("acme", &definitions)?)
//!     .build()
//!     .shared();
//!
//! let config = VaultConfig::from_file("envcred.toml")?;
//! let profiles = MemoryProfileRegistry::new()
//!     .with(EncryptionProfile::from_passphrase("default", "Default", "passphrase", b"salt"));
//!
//! let mut manager = CredentialsManager::builder(registry, config.open_backend()?)
//!     .profiles(Arc::new(profiles))
//!     .config(config)
//!     .open()?;
//!
//! manager.set_encrypt_profile_name("default")?;
//! manager.set(
//!     "billing",
//!     CredentialValue::new().with_field("api_key", "sk-live").with_endpoint("billing_api"),
//!     Some("PROD"),
//! )?;
//! manager.save_all()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod manager;
pub mod profile;
pub mod value;

// Re-export the most commonly used types at the crate root for convenience.
pub use config::{DecryptFailurePolicy, SettingsDefaults, VaultConfig};
pub use error::{Result, VaultError};
pub use manager::{CredentialsManager, ManagerBuilder};
pub use profile::{
    AesGcmService, EncryptionProfile, EncryptionService, MemoryProfileRegistry, ProfileRegistry,
};
pub use value::{CredentialValue, ENDPOINT_KEY, EndpointRef};
