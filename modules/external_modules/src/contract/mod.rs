//! Contract layer - public API for modules hosted by the framework
//!
//! This layer contains transport-agnostic models and the native client trait.
//! NO serde derives on models - these are pure domain types.

pub mod client;
pub mod error;
pub mod model;

pub use client::ExternalModuleApi;
pub use error::FrameworkError;
pub use model::{
    is_temporary_record_id, new_temporary_record_id, value_type_tag, LogParameterRow,
    LogParameters, LogRow, NewLogEntry, RequestContext, SettingScope, SettingSnapshot, SettingsMap, StoredSetting, SubSettingRow,
    TEMPORARY_RECORD_ID_PREFIX,
};
