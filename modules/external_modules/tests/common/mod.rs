//! Common test utilities: in-memory database and a sample module

#![allow(dead_code)]

use external_modules::infra::storage::entity::user;
use external_modules::{Config, Framework, NativeModuleClient, RequestContext};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::{json, Value};

pub const MODULE_PREFIX: &str = "vanity_survey";
pub const OTHER_PREFIX: &str = "record_audit";

/// Route `tracing` output through the test harness (honours `RUST_LOG`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config document of the sample module
pub fn module_config() -> Value {
    json!({
        "name": "Vanity Survey",
        "system-settings": [
            { "key": "api-token", "name": "API token" }
        ],
        "project-settings": [
            { "key": "greeting", "name": "Greeting" },
            { "key": "reviewer-count", "type": "text" },
            {
                "key": "reviewers",
                "type": "sub_settings",
                "repeatable": true,
                "sub_settings": [
                    { "key": "reviewer-name" },
                    { "key": "reviewer-email" }
                ]
            }
        ]
    })
}

/// Fresh framework on a private in-memory SQLite database
pub async fn setup() -> Framework {
    init_tracing();

    // Every pooled connection to `sqlite::memory:` is a separate database
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();

    let framework = Framework::from_connection(db, &Config::default())
        .await
        .unwrap();
    framework
        .register_module(MODULE_PREFIX, &module_config())
        .unwrap();
    framework
        .register_module(OTHER_PREFIX, &json!({ "project-settings": [] }))
        .unwrap();
    framework
}

pub fn client(framework: &Framework, ctx: RequestContext) -> NativeModuleClient {
    framework.module(MODULE_PREFIX, ctx).unwrap()
}

/// Insert a user account, returns its ui id
pub async fn add_user(framework: &Framework, username: &str) -> i64 {
    user::ActiveModel {
        username: Set(username.to_string()),
        ..Default::default()
    }
    .insert(framework.connection())
    .await
    .unwrap()
    .ui_id
}
