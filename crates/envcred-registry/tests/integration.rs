//! Integration tests for the envcred-registry crate.
//!
//! These tests exercise collection from several providers, validation
//! fallout, and the resulting registry snapshot.

use envcred_registry::{Collector, EntityKind, StaticProvider};
use serde_json::json;

const ACME: &str = r#"{
    "environments": [
        {"name": "PROD", "label": "Production"},
        {"name": "UAT", "label": "User acceptance"},
        {"label": "nameless"}
    ],
    "endpoints": [
        {"name": "provider1_uat", "label": "Provider1 API - UAT", "url": "https://uat.provider1.example"},
        {
            "name": "provider1_prod",
            "label": "Provider1 API - PROD",
            "url": "https://provider1.example",
            "user": "acme",
            "pass": "secret",
            "headers": {"X-Client": "acme"}
        }
    ],
    "credentials": [
        {
            "name": "service1",
            "label": "Service1",
            "parameters": [
                {"name": "client_id", "label": "Client ID", "type": "text"},
                {"name": "client_secret", "label": "Client secret", "type": "password"}
            ]
        },
        {"name": "service2", "label": "Service2", "parameters": []}
    ]
}"#;

// ═══════════════════════════════════════════════════════════════════════
//  Collection
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn registry_from_json_table() {
    let registry = Collector::new()
        .provider(StaticProvider::from_json("acme", ACME).unwrap())
        .build();

    let envs: Vec<_> = registry.environments().iter().map(|e| e.name()).collect();
    assert_eq!(envs, ["PROD", "UAT"]);

    assert_eq!(registry.endpoints().len(), 2);
    let prod = registry.endpoint("provider1_prod").unwrap();
    assert_eq!(prod.auth_user(), "acme");
    assert_eq!(prod.headers().len(), 1);

    let uat = registry.endpoint("provider1_uat").unwrap();
    assert_eq!(uat.auth_pass(), "");

    // service2 has no parameters and is dropped.
    assert_eq!(registry.credentials().len(), 1);
    let service1 = registry.credential("service1").unwrap();
    let kinds: Vec<_> = service1.parameters().iter().map(|p| p.kind()).collect();
    assert_eq!(kinds, ["text", "password"]);
}

#[test]
fn second_provider_extends_and_overrides() {
    let registry = Collector::new()
        .provider(StaticProvider::from_json("acme", ACME).unwrap())
        .provider(
            StaticProvider::new("local")
                .environment(json!({"name": "DEV", "label": "Development"}))
                .endpoint(json!({
                    "name": "provider1_uat",
                    "label": "Provider1 API - UAT (local)",
                    "url": "http://localhost:8080"
                })),
        )
        .build();

    assert_eq!(registry.environments().len(), 3);
    assert_eq!(
        registry.endpoint("provider1_uat").map(|e| e.url()),
        Some("http://localhost:8080")
    );
    // Overrides keep the first position.
    assert_eq!(registry.endpoints()[0].name(), "provider1_uat");
}

#[test]
fn collect_returns_only_requested_kind() {
    let collector = Collector::new().provider(StaticProvider::from_json("acme", ACME).unwrap());

    for kind in EntityKind::COLLECTED {
        assert!(collector.collect(kind).iter().all(|e| e.kind() == kind));
    }
    assert!(collector.collect(EntityKind::Parameter).is_empty());
}

#[test]
fn empty_collector_builds_empty_registry() {
    let registry = Collector::new().build();
    assert!(registry.environments().is_empty());
    assert!(registry.endpoints().is_empty());
    assert!(registry.credentials().is_empty());
}
