//! Integration tests for the envcred-vault crate.
//!
//! These tests drive the full lifecycle: definitions collected into a
//! registry, credentials set, saved, and reloaded by a fresh manager over
//! the same storage.

use std::sync::Arc;

use envcred_registry::{Collector, Registry, StaticProvider};
use envcred_store::{ConfigBackend, ConfigData, MemoryBackend, SqliteBackend, StoreError, StoreResult};
use envcred_vault::{
    CredentialValue, CredentialsManager, DecryptFailurePolicy, EncryptionProfile, EndpointRef,
    MemoryProfileRegistry, VaultConfig, VaultError,
};
use serde_json::json;

const DEFINITIONS: &str = r#"{
    "environments": [
        {"name": "A", "label": "Alpha"},
        {"name": "B", "label": "Beta"}
    ],
    "endpoints": [
        {"name": "ep1", "label": "Endpoint 1", "url": "http://x", "headers": {"Accept": "application/json"}}
    ],
    "credentials": [
        {"name": "billing", "label": "Billing", "parameters": [
            {"name": "api_key", "label": "API key", "type": "textfield"}
        ]},
        {"name": "empty", "label": "No parameters", "parameters": []}
    ]
}"#;

fn registry() -> Arc<Registry> {
    Collector::new()
        .provider(StaticProvider::from_json("acme", DEFINITIONS).unwrap())
        .build()
        .shared()
}

fn profiles() -> Arc<MemoryProfileRegistry> {
    Arc::new(
        MemoryProfileRegistry::new()
            .with(EncryptionProfile::generate("default", "Default").unwrap()),
    )
}

/// Open a manager that encrypts under the `default` profile.
fn open_encrypted(
    backend: &Arc<dyn ConfigBackend>,
    profiles: &Arc<MemoryProfileRegistry>,
) -> CredentialsManager {
    let mut manager = CredentialsManager::builder(registry(), Arc::clone(backend))
        .profiles(profiles.clone())
        .open()
        .unwrap();
    manager.set_encrypt_profile_name("default").unwrap();
    manager
}

fn stored_ciphertext(backend: &Arc<dyn ConfigBackend>, env: &str, name: &str) -> Option<String> {
    backend
        .read(&format!("envcred.credentials.{env}"))
        .unwrap()?
        .get("credentials")?
        .get(name)?
        .as_str()
        .map(str::to_owned)
}

/// Backend that refuses writes to one environment's object.
struct FailingBackend {
    inner: MemoryBackend,
    fail_on: String,
}

impl ConfigBackend for FailingBackend {
    fn read(&self, name: &str) -> StoreResult<Option<ConfigData>> {
        self.inner.read(name)
    }

    fn write(&self, name: &str, data: &ConfigData) -> StoreResult<()> {
        if name == self.fail_on {
            return Err(StoreError::Backend(format!("write to {name} refused")));
        }
        self.inner.write(name, data)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list(prefix)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Registry through the manager
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn definitions_are_validated_on_collection() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let manager = CredentialsManager::builder(registry(), backend).open().unwrap();

    let names: Vec<_> = manager.environments().iter().map(|e| e.name()).collect();
    assert_eq!(names, ["A", "B"]);

    let endpoint = manager.resolve_endpoint("ep1").unwrap();
    assert_eq!(endpoint.auth_user(), "");
    assert_eq!(endpoint.auth_pass(), "");
    assert_eq!(endpoint.headers().get("Accept").map(String::as_str), Some("application/json"));

    assert!(manager.credential_definition("billing").is_some());
    assert!(manager.credential_definition("empty").is_none());
    assert_eq!(manager.credential_definitions().len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Persistence
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn encrypted_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("envcred.db");
    let profiles = profiles();

    let value = {
        let backend: Arc<dyn ConfigBackend> = Arc::new(SqliteBackend::open(&path).unwrap());
        let mut manager = open_encrypted(&backend, &profiles);

        let endpoint = manager.resolve_endpoint("ep1").cloned().unwrap();
        let value = CredentialValue::new()
            .with_field("api_key", "sk-secret")
            .with_field("retries", 3)
            .with_endpoint(endpoint);
        manager.set("billing", value.clone(), Some("A")).unwrap();
        manager.save_all().unwrap();

        let ciphertext = stored_ciphertext(&backend, "A", "billing").unwrap();
        assert!(!ciphertext.contains("sk-secret"));
        value
    };

    let backend: Arc<dyn ConfigBackend> = Arc::new(SqliteBackend::open(&path).unwrap());
    let manager = open_encrypted(&backend, &profiles);
    let loaded = manager.get("billing", Some("A")).unwrap();

    assert_eq!(loaded, &value);
    assert!(matches!(loaded.endpoint(), Some(EndpointRef::Resolved(e)) if e.url() == "http://x"));
}

#[test]
fn unchanged_values_keep_their_ciphertext() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let profiles = profiles();

    let mut manager = open_encrypted(&backend, &profiles);
    manager
        .set("billing", CredentialValue::new().with_field("api_key", "k1"), Some("A"))
        .unwrap();
    manager.save_all().unwrap();
    let first = stored_ciphertext(&backend, "A", "billing").unwrap();

    manager.save_all().unwrap();
    assert_eq!(stored_ciphertext(&backend, "A", "billing").unwrap(), first);

    // A fresh instance loading and saving again must not churn either.
    let mut reopened = open_encrypted(&backend, &profiles);
    reopened.save_all().unwrap();
    assert_eq!(stored_ciphertext(&backend, "A", "billing").unwrap(), first);

    reopened
        .set("billing", CredentialValue::new().with_field("api_key", "k2"), Some("A"))
        .unwrap();
    reopened.save_all().unwrap();
    assert_ne!(stored_ciphertext(&backend, "A", "billing").unwrap(), first);
}

#[test]
fn unknown_endpoint_loads_as_none() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let mut manager = CredentialsManager::builder(registry(), Arc::clone(&backend))
        .open()
        .unwrap();
    manager
        .set(
            "billing",
            CredentialValue::new().with_field("api_key", "k").with_endpoint("ghost"),
            Some("A"),
        )
        .unwrap();
    manager.save_all().unwrap();

    let reopened = CredentialsManager::builder(registry(), backend).open().unwrap();
    let loaded = reopened.get("billing", Some("A")).unwrap();
    assert!(loaded.endpoint().is_none());
    assert_eq!(loaded.field_str("api_key"), Some("k"));
}

#[test]
fn failed_environment_does_not_roll_back_earlier_ones() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(FailingBackend {
        inner: MemoryBackend::new(),
        fail_on: "envcred.credentials.B".into(),
    });

    let mut manager = CredentialsManager::builder(registry(), Arc::clone(&backend))
        .open()
        .unwrap();
    manager
        .set("billing", CredentialValue::new().with_field("api_key", "a"), Some("A"))
        .unwrap();
    manager
        .set("billing", CredentialValue::new().with_field("api_key", "b"), Some("B"))
        .unwrap();

    assert!(matches!(manager.save_all(), Err(VaultError::Store(_))));

    let reopened = CredentialsManager::builder(registry(), backend).open().unwrap();
    assert_eq!(
        reopened.get("billing", Some("A")).and_then(|v| v.field_str("api_key")),
        Some("a")
    );
    assert!(reopened.get("billing", Some("B")).is_none());
}

#[test]
fn load_discards_unsaved_changes() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let mut manager = CredentialsManager::builder(registry(), backend).open().unwrap();
    manager
        .set("billing", CredentialValue::new().with_field("api_key", "k"), Some("A"))
        .unwrap();

    manager.load().unwrap();
    assert!(manager.get("billing", Some("A")).is_none());
}

// ═══════════════════════════════════════════════════════════════════════
//  Environments and settings
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn current_environment_is_the_default() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let mut manager = CredentialsManager::builder(registry(), Arc::clone(&backend))
        .open()
        .unwrap();
    manager.set_current_environment("B").unwrap();
    manager
        .set("billing", CredentialValue::new().with_field("api_key", "b"), None)
        .unwrap();
    manager.save_all().unwrap();

    let reopened = CredentialsManager::builder(registry(), backend).open().unwrap();
    assert_eq!(reopened.current_environment(), Some("B"));
    assert_eq!(reopened.get("billing", None), reopened.get("billing", Some("B")));
    assert!(reopened.get("billing", Some("A")).is_none());
}

#[test]
fn persisted_settings_override_config_defaults() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let config = VaultConfig::from_toml_str(
        r#"
        [defaults]
        current_environment = "A"
        "#,
    )
    .unwrap();

    let mut manager = CredentialsManager::builder(registry(), Arc::clone(&backend))
        .config(config.clone())
        .open()
        .unwrap();
    assert_eq!(manager.current_environment(), Some("A"));
    manager.set_current_environment("B").unwrap();

    let reopened = CredentialsManager::builder(registry(), backend)
        .config(config)
        .open()
        .unwrap();
    assert_eq!(reopened.current_environment(), Some("B"));
}

#[test]
fn namespace_scopes_storage() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let config = VaultConfig::from_toml_str(r#"namespace = "acme""#).unwrap();

    let mut manager = CredentialsManager::builder(registry(), Arc::clone(&backend))
        .config(config)
        .open()
        .unwrap();
    manager.set("billing", None, Some("A")).unwrap();
    manager.save_all().unwrap();

    assert_eq!(backend.list("acme.").unwrap(), ["acme.credentials.A"]);
    assert!(backend.list("envcred.").unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
//  Unreadable ciphertext
// ═══════════════════════════════════════════════════════════════════════

fn seed_garbage(backend: &Arc<dyn ConfigBackend>) {
    let mut data = ConfigData::new();
    data.insert("credentials".into(), json!({"billing": "not base64 !!"}));
    backend.write("envcred.credentials.A", &data).unwrap();

    let mut settings = ConfigData::new();
    settings.insert("encrypt_profile".into(), json!("default"));
    backend.write("envcred.config", &settings).unwrap();
}

#[test]
fn unreadable_ciphertext_aborts_by_default() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    seed_garbage(&backend);

    let result = CredentialsManager::builder(registry(), backend)
        .profiles(profiles())
        .open();
    assert!(matches!(result, Err(VaultError::DecryptionFailed { .. })));
}

#[test]
fn unreadable_ciphertext_can_be_skipped() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    seed_garbage(&backend);

    let config = VaultConfig {
        decrypt_failure: DecryptFailurePolicy::Skip,
        ..VaultConfig::default()
    };
    let manager = CredentialsManager::builder(registry(), backend)
        .profiles(profiles())
        .config(config)
        .open()
        .unwrap();

    assert!(manager.get("billing", Some("A")).is_none());
    assert_eq!(manager.credential_names(Some("A")), ["billing"]);
}

fn skip_config() -> VaultConfig {
    VaultConfig {
        decrypt_failure: DecryptFailurePolicy::Skip,
        ..VaultConfig::default()
    }
}

#[test]
fn skipped_ciphertext_survives_unrelated_saves() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    let original = profiles();

    let mut manager = open_encrypted(&backend, &original);
    manager
        .set("billing", CredentialValue::new().with_field("api_key", "sk-1"), Some("A"))
        .unwrap();
    manager.save_all().unwrap();
    let sealed = stored_ciphertext(&backend, "A", "billing").unwrap();

    // Same profile name, different key.
    let mut rotated = CredentialsManager::builder(registry(), Arc::clone(&backend))
        .profiles(profiles())
        .config(skip_config())
        .open()
        .unwrap();
    assert!(rotated.get("billing", Some("A")).is_none());
    assert!(rotated.is_unreadable("billing", Some("A")));

    rotated
        .set("other", CredentialValue::new().with_field("k", "v"), Some("A"))
        .unwrap();
    rotated.save_all().unwrap();
    rotated.save_all().unwrap();
    assert_eq!(stored_ciphertext(&backend, "A", "billing").unwrap(), sealed);

    let restored = CredentialsManager::builder(registry(), backend)
        .profiles(original)
        .config(skip_config())
        .open()
        .unwrap();
    assert_eq!(
        restored.get("billing", Some("A")).and_then(|v| v.field_str("api_key")),
        Some("sk-1")
    );
}

#[test]
fn replacing_a_skipped_entry_overwrites_it() {
    let backend: Arc<dyn ConfigBackend> = Arc::new(MemoryBackend::new());
    seed_garbage(&backend);

    let mut manager = CredentialsManager::builder(registry(), Arc::clone(&backend))
        .profiles(profiles())
        .config(skip_config())
        .open()
        .unwrap();
    manager.set("billing", None, Some("A")).unwrap();
    assert!(!manager.is_unreadable("billing", Some("A")));
    manager.save_all().unwrap();
    assert_eq!(stored_ciphertext(&backend, "A", "billing").unwrap(), "");

    seed_garbage(&backend);
    manager.load().unwrap();
    assert!(manager.remove("billing", Some("A")).unwrap());
    manager.save_all().unwrap();
    assert!(stored_ciphertext(&backend, "A", "billing").is_none());
}
