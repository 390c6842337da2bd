//! Configuration for the external module framework

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Framework configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database connection string
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum length of a stored (prefixed) setting key
    #[serde(default = "default_max_key_length")]
    pub max_key_length: usize,

    /// Maximum serialized setting value size in bytes
    #[serde(default = "default_max_value_size")]
    pub max_value_size: usize,

    /// Validate module config documents against the embedded JSON Schema
    #[serde(default = "default_true")]
    pub validate_config_documents: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_key_length: default_max_key_length(),
            max_value_size: default_max_value_size(),
            validate_config_documents: true,
        }
    }
}

impl Config {
    /// Load configuration: defaults, then an optional YAML file, then
    /// `EXTERNAL_MODULES_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed("EXTERNAL_MODULES_"))
            .extract()?;
        Ok(config)
    }
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_max_key_length() -> usize {
    255
}

fn default_true() -> bool {
    true
}

fn default_max_value_size() -> usize {
    1024 * 1024 // 1MB
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_key_length, 255);
        assert_eq!(config.max_value_size, 1024 * 1024);
        assert!(config.validate_config_documents);
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_key_length: 64\nmax_value_size: 128").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.max_key_length, 64);
        assert_eq!(config.max_value_size, 128);
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not_a_field: 1").unwrap();

        assert!(Config::load(Some(file.path())).is_err());
    }
}
