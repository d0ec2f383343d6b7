//! Database configuration loaded from TOML

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::logging_facility::{self, Profile};

/// Engine-wide settings
///
/// ```
/// use normstore_core::config::DatabaseConfig;
///
/// let config = DatabaseConfig::from_toml_str("wrap = false").unwrap();
/// assert!(!config.wrap);
/// assert_eq!(config.recursive_depth, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Adapt query results into model instances by default
    #[serde(default = "default_wrap")]
    pub wrap: bool,

    /// Default depth for recursive relation loading
    #[serde(default = "default_recursive_depth")]
    pub recursive_depth: usize,

    #[serde(default)]
    pub logging: Profile,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            wrap: default_wrap(),
            recursive_depth: default_recursive_depth(),
            logging: Profile::default(),
        }
    }
}

fn default_wrap() -> bool {
    true
}

fn default_recursive_depth() -> usize {
    3
}

impl DatabaseConfig {
    /// # Errors
    ///
    /// Returns `Config` if the text is not valid TOML for this structure.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, or see [`DatabaseConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Install the logging subscriber for the configured profile
    ///
    /// See [`logging_facility::init`]; only the first call in a process has
    /// any effect.
    pub fn init_logging(&self) {
        logging_facility::init(self.logging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::default();
        assert!(config.wrap);
        assert_eq!(config.recursive_depth, 3);
        assert_eq!(config.logging, Profile::Development);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        assert_eq!(
            DatabaseConfig::from_toml_str("").unwrap(),
            DatabaseConfig::default()
        );
    }

    #[test]
    fn test_full_toml() {
        let config = DatabaseConfig::from_toml_str(
            r#"
            wrap = false
            recursive_depth = 1
            logging = "production"
            "#,
        )
        .unwrap();
        assert!(!config.wrap);
        assert_eq!(config.recursive_depth, 1);
        assert_eq!(config.logging, Profile::Production);
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        let config = DatabaseConfig::from_toml_str("logging = \"test\"").unwrap();
        assert_eq!(config.logging, Profile::Test);

        config.init_logging();
        config.init_logging();
        tracing::debug!(entity = "users", "logged after init");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = DatabaseConfig::from_toml_str("wrap = \"yes\"").unwrap_err();
        assert!(matches!(err, StoreError::Config { .. }));
    }
}
