//! Domain layer - business logic and services

pub mod events;
pub mod logs;
pub mod query;
pub mod records;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod settings;
pub mod sub_settings;
pub mod validation;

pub use events::{NoOpEventPublisher, SettingEvent, SettingEventPublisher};
pub use logs::LogService;
pub use query::{LogQueryTranslator, QueryScope, SqlDialect, TranslatedQuery};
pub use records::RecordAllocator;
pub use registry::{ModuleEntry, ModuleRegistry};
pub use repository::{LogRepository, ModuleRepository, RecordRepository, SettingsRepository};
pub use schema::{ModuleConfig, SettingDefinition};
pub use settings::SettingsService;
pub use sub_settings::SubSettingsResolver;
pub use validation::SettingLimits;
