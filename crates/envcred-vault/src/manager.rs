//! Environment-scoped, encrypted credential store.
//!
//! The [`CredentialsManager`] loads every registered environment's stored
//! credentials once, decrypts them into an in-memory cache, and writes the
//! cache back on [`save_all`](CredentialsManager::save_all).
//!
//! # Storage layout
//!
//! Each environment owns one config object, `<namespace>.credentials.<env>`,
//! whose `credentials` field maps credential names to ciphertext (or `""`
//! for an empty entry). Settings live in `<namespace>.config` under
//! `current_environment` and `encrypt_profile`.
//!
//! # Change detection
//!
//! Encryption may be non-deterministic, so re-encrypting an unchanged value
//! would still produce a new ciphertext. On save, each value's canonical
//! form is compared with the decrypted previous ciphertext; when they match
//! the previous ciphertext is written back verbatim.
//!
//! Saves are not atomic across environments: if environment K fails,
//! environments saved before it stay saved.

use std::collections::{BTreeMap, HashMap, hash_map::Entry};
use std::sync::Arc;

use envcred_registry::{Credential, Endpoint, Environment, Registry};
use envcred_store::{Config, ConfigBackend};
use serde_json::{Map, Value};

use crate::config::{DecryptFailurePolicy, VaultConfig};
use crate::error::{Result, VaultError};
use crate::profile::{
    AesGcmService, EncryptionProfile, EncryptionService, MemoryProfileRegistry, ProfileRegistry,
};
use crate::value::{CredentialValue, EndpointRef, parse_canonical};

/// Field of an environment's config object holding the ciphertext map.
const CREDENTIALS_FIELD: &str = "credentials";
const CURRENT_ENVIRONMENT: &str = "current_environment";
const ENCRYPT_PROFILE: &str = "encrypt_profile";

type EnvironmentCache = BTreeMap<String, Option<CredentialValue>>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collaborators and options for [`CredentialsManager::open`].
pub struct ManagerBuilder {
    registry: Arc<Registry>,
    backend: Arc<dyn ConfigBackend>,
    encryption: Arc<dyn EncryptionService>,
    profiles: Arc<dyn ProfileRegistry>,
    config: VaultConfig,
}

impl ManagerBuilder {
    /// Encryption service used for the configured profile. Defaults to
    /// [`AesGcmService`].
    pub fn encryption(mut self, service: Arc<dyn EncryptionService>) -> Self {
        self.encryption = service;
        self
    }

    /// Profile registry. Defaults to an empty [`MemoryProfileRegistry`],
    /// which leaves every value in plaintext.
    pub fn profiles(mut self, profiles: Arc<dyn ProfileRegistry>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Vault configuration. Defaults to [`VaultConfig::default`].
    pub fn config(mut self, config: VaultConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the manager and load every environment's credentials.
    pub fn open(self) -> Result<CredentialsManager> {
        self.config.validate()?;

        let settings = Config::editable(Arc::clone(&self.backend), self.config.settings_name())?;
        let current_environment = settings
            .get_str(CURRENT_ENVIRONMENT)
            .map(str::to_owned)
            .or_else(|| self.config.defaults.current_environment.clone());
        let encrypt_profile = settings
            .get_str(ENCRYPT_PROFILE)
            .map(str::to_owned)
            .or_else(|| self.config.defaults.encrypt_profile.clone());

        let mut manager = CredentialsManager {
            registry: self.registry,
            backend: self.backend,
            encryption: self.encryption,
            profiles: self.profiles,
            config: self.config,
            settings,
            storages: HashMap::new(),
            credentials: BTreeMap::new(),
            unreadable: BTreeMap::new(),
            current_environment,
            encrypt_profile,
        };

        manager.load()?;
        Ok(manager)
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Cached, encrypted-at-rest credential storage per environment.
///
/// # Example
///
/// ```rust
/// # use std::sync::Arc;
/// # use envcred_registry::{Collector, StaticProvider};
/// # use envcred_store::MemoryBackend;
/// # use envcred_vault::{CredentialValue, CredentialsManager};
/// # use serde_json::json;
/// # fn example() -> envcred_vault::Result<()> {
/// let registry = Collector::new()
///     .provider(StaticProvider::new("acme").environment(json!({"name": "PROD", "label": "Production"})))
///     .build()
///     .shared();
///
/// let mut manager = CredentialsManager::builder(registry, Arc::new(MemoryBackend::new())).open()?;
/// manager.set("billing", CredentialValue::new().with_field("api_key", "sk-1"), Some("PROD"))?;
/// manager.save_all()?;
///
/// assert_eq!(
///     manager.get("billing", Some("PROD")).and_then(|v| v.field_str("api_key")),
///     Some("sk-1"),
/// );
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct CredentialsManager {
    registry: Arc<Registry>,
    backend: Arc<dyn ConfigBackend>,
    encryption: Arc<dyn EncryptionService>,
    profiles: Arc<dyn ProfileRegistry>,
    config: VaultConfig,
    settings: Config,
    /// Memoized storage handle per environment.
    storages: HashMap<String, Config>,
    credentials: BTreeMap<String, EnvironmentCache>,
    /// Ciphertext of entries skipped during load, written back verbatim
    /// until the entry is replaced or removed.
    unreadable: BTreeMap<String, BTreeMap<String, String>>,
    current_environment: Option<String>,
    encrypt_profile: Option<String>,
}

impl CredentialsManager {
    /// Start building a manager over `registry` and `backend`.
    pub fn builder(registry: Arc<Registry>, backend: Arc<dyn ConfigBackend>) -> ManagerBuilder {
        ManagerBuilder {
            registry,
            backend,
            encryption: Arc::new(AesGcmService),
            profiles: Arc::new(MemoryProfileRegistry::new()),
            config: VaultConfig::default(),
        }
    }

    // -- Loading ------------------------------------------------------------

    /// Rebuild the cache from persistent storage.
    ///
    /// Unsaved changes are discarded. A stored entry that fails to decrypt
    /// or parse aborts the load unless the config selects
    /// [`DecryptFailurePolicy::Skip`]. Skipped entries read as empty but keep
    /// their stored ciphertext on save.
    pub fn load(&mut self) -> Result<()> {
        self.credentials.clear();
        self.unreadable.clear();
        let registry = Arc::clone(&self.registry);

        for environment in registry.environments() {
            let env = environment.name();
            let handle = self.storage(env)?;
            handle.reload()?;

            let Some(stored) = handle.get(CREDENTIALS_FIELD).cloned() else {
                tracing::debug!(environment = env, "no stored credentials");
                continue;
            };
            let Value::Object(stored) = stored else {
                return Err(VaultError::MalformedRecord {
                    environment: env.to_owned(),
                    credential: String::new(),
                    reason: format!("`{CREDENTIALS_FIELD}` is not an object"),
                });
            };

            let mut cache = EnvironmentCache::new();
            for (name, ciphertext) in &stored {
                let ciphertext = stored_ciphertext(env, name, ciphertext)?;
                let value = match self.materialize(env, name, ciphertext) {
                    Ok(value) => value,
                    Err(err) if self.config.decrypt_failure == DecryptFailurePolicy::Skip => {
                        tracing::warn!(environment = env, credential = %name, error = %err, "skipping unreadable credential");
                        self.unreadable
                            .entry(env.to_owned())
                            .or_default()
                            .insert(name.clone(), ciphertext.to_owned());
                        None
                    }
                    Err(err) => return Err(err),
                };
                cache.insert(name.clone(), value);
            }

            tracing::info!(environment = env, count = cache.len(), "credentials loaded");
            self.credentials.insert(env.to_owned(), cache);
        }

        Ok(())
    }

    /// Decrypt, parse and resolve one stored entry.
    fn materialize(
        &self,
        env: &str,
        name: &str,
        ciphertext: &str,
    ) -> Result<Option<CredentialValue>> {
        if ciphertext.is_empty() {
            return Ok(None);
        }

        let plaintext = self.decrypt(ciphertext)?;
        let Some(stored) = parse_canonical(&plaintext, env, name)? else {
            return Ok(None);
        };

        let endpoint = stored.endpoint.as_deref().and_then(|endpoint| {
            let resolved = self.resolve_endpoint(endpoint);
            if resolved.is_none() {
                tracing::debug!(environment = env, credential = name, endpoint, "unknown endpoint reference");
            }
            resolved.cloned().map(EndpointRef::Resolved)
        });

        Ok(Some(CredentialValue::from_parts(stored.fields, endpoint)))
    }

    // -- Cache access -------------------------------------------------------

    /// Cached credential `name` in `environment` (default: current).
    ///
    /// Pure cache lookup: no I/O, no decryption.
    pub fn get(&self, name: &str, environment: Option<&str>) -> Option<&CredentialValue> {
        let env = environment.or(self.current_environment.as_deref())?;
        self.credentials.get(env)?.get(name)?.as_ref()
    }

    /// Replace the cached credential `name` in `environment` (default:
    /// current). Nothing is persisted until [`save_all`](Self::save_all).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoEnvironment`] when no environment is given
    /// and no current environment is set.
    pub fn set(
        &mut self,
        name: &str,
        data: impl Into<Option<CredentialValue>>,
        environment: Option<&str>,
    ) -> Result<()> {
        let env = self.environment_or_current(name, environment)?;
        tracing::debug!(environment = %env, credential = name, "credential set");
        self.forget_unreadable(&env, name);
        self.credentials
            .entry(env)
            .or_default()
            .insert(name.to_owned(), data.into());
        Ok(())
    }

    /// Drop the cached credential so the next save no longer stores it.
    ///
    /// Returns `true` if an entry existed.
    pub fn remove(&mut self, name: &str, environment: Option<&str>) -> Result<bool> {
        let env = self.environment_or_current(name, environment)?;
        self.forget_unreadable(&env, name);
        Ok(self
            .credentials
            .get_mut(&env)
            .is_some_and(|cache| cache.remove(name).is_some()))
    }

    /// `true` if `name` in `environment` (default: current) was skipped on
    /// load because it could not be decrypted or parsed.
    pub fn is_unreadable(&self, name: &str, environment: Option<&str>) -> bool {
        environment
            .or(self.current_environment.as_deref())
            .and_then(|env| self.unreadable.get(env))
            .is_some_and(|skipped| skipped.contains_key(name))
    }

    fn forget_unreadable(&mut self, env: &str, name: &str) {
        if let Some(skipped) = self.unreadable.get_mut(env) {
            skipped.remove(name);
        }
    }

    /// Names of the cached credentials in `environment` (default: current).
    pub fn credential_names(&self, environment: Option<&str>) -> Vec<&str> {
        environment
            .or(self.current_environment.as_deref())
            .and_then(|env| self.credentials.get(env))
            .map(|cache| cache.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn environment_or_current(&self, name: &str, environment: Option<&str>) -> Result<String> {
        environment
            .or(self.current_environment.as_deref())
            .map(str::to_owned)
            .ok_or_else(|| VaultError::NoEnvironment {
                credential: name.to_owned(),
            })
    }

    // -- Persistence --------------------------------------------------------

    /// Persist every cached environment.
    ///
    /// Values whose canonical form matches the decrypted stored ciphertext
    /// keep that ciphertext; everything else is encrypted afresh. Entries
    /// skipped on load are written back unchanged.
    pub fn save_all(&mut self) -> Result<()> {
        let environments: Vec<String> = self.credentials.keys().cloned().collect();

        for env in environments {
            let handle = self.storage(&env)?;
            handle.reload()?;
            let existing = handle
                .get(CREDENTIALS_FIELD)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            let (stored, reused) = self.encode_environment(&env, &existing)?;
            let count = stored.len();

            self.storage(&env)?
                .set(CREDENTIALS_FIELD, Value::Object(stored))
                .save()?;

            tracing::info!(environment = %env, count, reused, "credentials saved");
        }

        Ok(())
    }

    /// Build the ciphertext map for one environment.
    ///
    /// Returns the map and how many previous ciphertexts were reused.
    fn encode_environment(
        &self,
        env: &str,
        existing: &Map<String, Value>,
    ) -> Result<(Map<String, Value>, usize)> {
        let mut stored = Map::new();
        let mut reused = 0;

        let Some(cache) = self.credentials.get(env) else {
            return Ok((stored, reused));
        };

        let skipped = self.unreadable.get(env);

        for (name, value) in cache {
            let Some(value) = value else {
                let ciphertext = match skipped.and_then(|skipped| skipped.get(name)) {
                    Some(ciphertext) => {
                        reused += 1;
                        ciphertext.clone()
                    }
                    None => String::new(),
                };
                stored.insert(name.clone(), Value::String(ciphertext));
                continue;
            };

            let canonical = value.to_canonical()?;
            let previous = existing
                .get(name)
                .and_then(Value::as_str)
                .filter(|ciphertext| !ciphertext.is_empty());

            let ciphertext = match previous {
                Some(previous) if self.decrypt(previous)? == canonical => {
                    reused += 1;
                    previous.to_owned()
                }
                _ => {
                    tracing::debug!(environment = env, credential = %name, "credential changed, encrypting");
                    self.encrypt(&canonical)?
                }
            };

            stored.insert(name.clone(), Value::String(ciphertext));
        }

        Ok((stored, reused))
    }

    /// Storage handle for `environment`, created on first use.
    fn storage(&mut self, environment: &str) -> Result<&mut Config> {
        match self.storages.entry(environment.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let name = self.config.storage_name(environment);
                let handle = Config::editable(Arc::clone(&self.backend), name)?;
                Ok(entry.insert(handle))
            }
        }
    }

    // -- Encryption ---------------------------------------------------------

    /// The configured profile, if it is set and resolvable.
    fn active_profile(&self) -> Option<EncryptionProfile> {
        let name = self.encrypt_profile.as_deref().filter(|n| !n.is_empty())?;
        let profile = self.profiles.load(name);
        if profile.is_none() {
            tracing::debug!(profile = name, "encryption profile not found, passing data through");
        }
        profile
    }

    /// Encrypt with the configured profile; identity when there is none.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        match self.active_profile() {
            Some(profile) => self.encryption.encrypt(plaintext, &profile),
            None => Ok(plaintext.to_owned()),
        }
    }

    /// Decrypt with the configured profile; identity when there is none.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        match self.active_profile() {
            Some(profile) => self.encryption.decrypt(ciphertext, &profile),
            None => Ok(ciphertext.to_owned()),
        }
    }

    // -- Settings -----------------------------------------------------------

    /// Environment used when a call omits one.
    pub fn current_environment(&self) -> Option<&str> {
        self.current_environment.as_deref()
    }

    /// Persist a new current environment. An empty name unsets it.
    pub fn set_current_environment(&mut self, name: &str) -> Result<()> {
        self.save_setting(CURRENT_ENVIRONMENT, name)?;
        self.current_environment = Some(name.to_owned()).filter(|n| !n.is_empty());
        tracing::info!(environment = name, "current environment changed");
        Ok(())
    }

    /// Name of the profile values are encrypted under.
    pub fn encrypt_profile_name(&self) -> Option<&str> {
        self.encrypt_profile.as_deref()
    }

    /// Persist a new encryption profile name.
    ///
    /// Values already stored stay encrypted under the previous profile until
    /// they are next re-encrypted, so switching profiles with unsaved,
    /// unreadable ciphertext in storage makes [`save_all`](Self::save_all)
    /// fail on decrypt.
    pub fn set_encrypt_profile_name(&mut self, name: &str) -> Result<()> {
        self.save_setting(ENCRYPT_PROFILE, name)?;
        self.encrypt_profile = Some(name.to_owned()).filter(|n| !n.is_empty());
        tracing::info!(profile = name, "encryption profile changed");
        Ok(())
    }

    /// Commit one settings field. On failure the staged field is restored
    /// so a later save does not pick it up.
    fn save_setting(&mut self, field: &str, value: &str) -> Result<()> {
        let previous = self.settings.get(field).cloned();
        if let Err(err) = self.settings.set(field, value).save() {
            match previous {
                Some(previous) => self.settings.set(field, previous),
                None => self.settings.clear(field),
            };
            return Err(err.into());
        }
        Ok(())
    }

    /// Every profile known to the profile registry.
    pub fn all_encrypt_profiles(&self) -> Vec<EncryptionProfile> {
        self.profiles.list()
    }

    // -- Registry passthrough -----------------------------------------------

    /// The registry this manager resolves entities against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Every registered environment.
    pub fn environments(&self) -> &[Environment] {
        self.registry.environments()
    }

    /// First endpoint registered under `name`.
    pub fn resolve_endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.registry.endpoint(name)
    }

    /// Credential definition registered under `name`.
    pub fn credential_definition(&self, name: &str) -> Option<&Credential> {
        self.registry.credential(name)
    }

    /// Every registered credential definition.
    pub fn credential_definitions(&self) -> &[Credential] {
        self.registry.credentials()
    }
}

/// Ciphertext string of a stored entry; `null` reads as empty.
fn stored_ciphertext<'a>(env: &str, name: &str, value: &'a Value) -> Result<&'a str> {
    match value {
        Value::String(ciphertext) => Ok(ciphertext),
        Value::Null => Ok(""),
        other => Err(VaultError::MalformedRecord {
            environment: env.to_owned(),
            credential: name.to_owned(),
            reason: format!("expected a ciphertext string, found `{other}`"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
