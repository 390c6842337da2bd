//! External Modules
//!
//! Plugin framework for third-party modules: per-module settings with global
//! and project scope, and a per-module audit log with a restricted query
//! language that is always confined to the calling module.

// Public exports
pub mod contract;
pub use contract::{
    client::ExternalModuleApi, error::FrameworkError, LogParameters, LogRow, RequestContext,
    SettingScope, SettingSnapshot, SettingsMap, SubSettingRow,
};

pub mod config;
pub use config::Config;

pub mod module;
pub use module::Framework;

pub mod api;
pub use api::native::NativeModuleClient;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
