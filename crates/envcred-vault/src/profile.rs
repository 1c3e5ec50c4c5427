//! Encryption profiles and the encryption service seam.
//!
//! A profile is a named, resolved encryption configuration. The vault looks
//! the configured profile up by name in a [`ProfileRegistry`] and hands it
//! to an [`EncryptionService`]; both are traits so hosts can plug in their
//! own key management.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::crypto;
use crate::error::{Result, VaultError};

/// A resolved encryption profile.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionProfile {
    name: String,
    label: String,
    key: Vec<u8>,
}

impl EncryptionProfile {
    /// Build a profile around raw key material.
    pub fn new(name: impl Into<String>, label: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            key: key.into(),
        }
    }

    /// Build a profile with a freshly generated AES-256 key.
    pub fn generate(name: impl Into<String>, label: impl Into<String>) -> Result<Self> {
        Ok(Self::new(name, label, crypto::random_bytes(crypto::KEY_LEN)?))
    }

    /// Build a profile whose key is derived from a passphrase and salt.
    pub fn from_passphrase(
        name: impl Into<String>,
        label: impl Into<String>,
        passphrase: &str,
        salt: &[u8],
    ) -> Self {
        Self::new(name, label, crypto::derive_key(passphrase.as_bytes(), salt).to_vec())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl std::fmt::Debug for EncryptionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionProfile")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Profile registry
// ---------------------------------------------------------------------------

/// Lookup of encryption profiles by name.
pub trait ProfileRegistry: Send + Sync {
    /// Resolve a profile, `None` if it does not exist.
    fn load(&self, name: &str) -> Option<EncryptionProfile>;

    /// Every known profile, ordered by name.
    fn list(&self) -> Vec<EncryptionProfile>;
}

/// In-memory profile registry.
#[derive(Debug, Default)]
pub struct MemoryProfileRegistry {
    profiles: RwLock<BTreeMap<String, EncryptionProfile>>,
}

impl MemoryProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, profile: EncryptionProfile) -> Self {
        self.insert(profile);
        self
    }

    /// Add or replace a profile.
    pub fn insert(&self, profile: EncryptionProfile) {
        tracing::debug!(profile = profile.name(), "encryption profile registered");
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.name.clone(), profile);
        }
    }

    /// Remove a profile. Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.profiles
            .write()
            .map(|mut profiles| profiles.remove(name).is_some())
            .unwrap_or(false)
    }
}

impl ProfileRegistry for MemoryProfileRegistry {
    fn load(&self, name: &str) -> Option<EncryptionProfile> {
        self.profiles.read().ok()?.get(name).cloned()
    }

    fn list(&self) -> Vec<EncryptionProfile> {
        self.profiles
            .read()
            .map(|profiles| profiles.values().cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Encryption service
// ---------------------------------------------------------------------------

/// Opaque encryption primitive bound to a resolved profile.
pub trait EncryptionService: Send + Sync {
    fn encrypt(&self, plaintext: &str, profile: &EncryptionProfile) -> Result<String>;

    fn decrypt(&self, ciphertext: &str, profile: &EncryptionProfile) -> Result<String>;
}

/// AES-256-GCM service over [`crypto::seal`] / [`crypto::open`].
///
/// Output is non-deterministic: every call uses a fresh nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmService;

impl EncryptionService for AesGcmService {
    fn encrypt(&self, plaintext: &str, profile: &EncryptionProfile) -> Result<String> {
        crypto::seal(plaintext.as_bytes(), profile.key())
    }

    fn decrypt(&self, ciphertext: &str, profile: &EncryptionProfile) -> Result<String> {
        let plaintext = crypto::open(ciphertext, profile.key())?;
        String::from_utf8(plaintext).map_err(|e| VaultError::DecryptionFailed {
            reason: format!("plaintext is not UTF-8: {e}"),
        })
    }
}
