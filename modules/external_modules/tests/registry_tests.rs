//! Integration tests for module registration

mod common;

use common::{setup, MODULE_PREFIX};
use external_modules::{ExternalModuleApi, FrameworkError, RequestContext};
use serde_json::{json, Value};

fn configuration_message(err: FrameworkError) -> String {
    match err {
        FrameworkError::Configuration { message, .. } => message,
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_keys_prevent_registration() {
    let framework = setup().await;

    let document = json!({
        "system-settings": [{ "key": "token" }],
        "project-settings": [{
            "key": "group",
            "type": "sub_settings",
            "sub_settings": [{ "key": "token" }]
        }]
    });
    let message = configuration_message(framework.register_module("dupes", &document).unwrap_err());
    assert!(message.contains("\"token\" setting multiple times"), "{}", message);

    let err = framework
        .module("dupes", RequestContext::default())
        .err()
        .unwrap();
    assert!(matches!(err, FrameworkError::Validation { .. }));
}

#[tokio::test]
async fn test_invalid_key_prevents_registration() {
    let framework = setup().await;

    let message = configuration_message(
        framework
            .register_module("bad_keys", &json!({ "project-settings": [{ "key": "Bad" }] }))
            .unwrap_err(),
    );
    assert!(message.contains("bad_keys"));
    assert!(message.contains("Bad"));
}

#[tokio::test]
async fn test_malformed_document_is_rejected() {
    let framework = setup().await;

    let err = framework
        .register_module("shapeless", &json!({ "project-settings": [{ "name": "no key" }] }))
        .unwrap_err();
    assert!(matches!(err, FrameworkError::Configuration { ref prefix, .. } if prefix == "shapeless"));
}

#[tokio::test]
async fn test_failed_reregistration_keeps_previous_entry() {
    let framework = setup().await;

    let broken = json!({ "project-settings": [{ "key": "a" }, { "key": "a" }] });
    assert!(framework.register_module(MODULE_PREFIX, &broken).is_err());

    let module = framework
        .module(MODULE_PREFIX, RequestContext::default().with_project(1))
        .unwrap();
    module
        .set_project_setting("reviewer-name", json!(["Ann"]), None)
        .await
        .unwrap();
    let rows = module.get_sub_settings("reviewers", None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["reviewer-email"], Value::Null);
}

#[tokio::test]
async fn test_module_ids_survive_invalidation() {
    let framework = setup().await;
    let module = framework
        .module(MODULE_PREFIX, RequestContext::default())
        .unwrap();
    module.set_system_setting("greeting", json!("hi")).await.unwrap();

    framework.registry().invalidate(MODULE_PREFIX);
    assert!(framework.module(MODULE_PREFIX, RequestContext::default()).is_err());

    framework
        .register_module(MODULE_PREFIX, &common::module_config())
        .unwrap();
    let module = framework
        .module(MODULE_PREFIX, RequestContext::default())
        .unwrap();
    assert_eq!(module.get_system_setting("greeting").await.unwrap(), json!("hi"));
}
