//! TOML configuration for the catalog process.
//!
//! ```toml
//! [db]
//! path = "/var/lib/catalog/catalog.db"   # or ":memory:"
//! pool_size = 8
//!
//! [logger]
//! level = "info"
//! dir = "/var/log/catalog"                # omit to log to stderr
//!
//! [seed]
//! categories = ["food", "food.cafe", "auto"]
//! ```
//!
//! Missing sections fall back to defaults: in-memory database, build-mode log
//! level on stderr, no seed data.

use crate::logging::{default_log_level, normalize_level};
use crate::model::{CategoryPath, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const IN_MEMORY_PATH: &str = ":memory:";
pub const DEFAULT_POOL_SIZE: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub logger: LoggerConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// SQLite file path, or `":memory:"`.
    pub path: String,
    /// Maximum pooled connections shared by every repository.
    pub pool_size: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: IN_MEMORY_PATH.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl DbConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_PATH
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
    /// Absolute directory for rotating log files. `None` logs to stderr.
    pub dir: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Category paths inserted when the category table is empty.
    pub categories: Vec<String>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db.path.trim().is_empty() {
            return Err(ConfigError::Invalid("'db.path' is empty".to_string()));
        }
        if self.db.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "'db.pool_size' must be at least 1".to_string(),
            ));
        }
        normalize_level(&self.logger.level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(dir) = &self.logger.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "'logger.dir' must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        self.seed_categories()?;
        Ok(())
    }

    /// Parsed seed paths, in configured order.
    pub fn seed_categories(&self) -> Result<Vec<CategoryPath>, ConfigError> {
        self.seed
            .categories
            .iter()
            .map(|name| CategoryPath::parse(name))
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(|err| ConfigError::Invalid(format!("'seed.categories': {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, DEFAULT_POOL_SIZE};

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert!(config.db.is_in_memory());
        assert_eq!(config.db.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.logger.dir.is_none());
        assert!(config.seed.categories.is_empty());
    }

    #[test]
    fn full_document_is_parsed() {
        let config = Config::from_toml_str(
            r#"
            [db]
            path = "/tmp/catalog.db"
            pool_size = 2

            [logger]
            level = "WARNING"
            dir = "/tmp/catalog-logs"

            [seed]
            categories = ["food", "food.cafe"]
            "#,
        )
        .unwrap();
        assert_eq!(config.db.path, "/tmp/catalog.db");
        assert!(!config.db.is_in_memory());
        assert_eq!(config.db.pool_size, 2);
        assert_eq!(config.seed_categories().unwrap().len(), 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_toml_str("[logger]\nlevel = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_toml_str("[logger]\ndir = \"logs\"").unwrap_err();
        assert!(err.to_string().contains("absolute"));

        let err = Config::from_toml_str("[seed]\ncategories = [\"a..b\"]").unwrap_err();
        assert!(err.to_string().contains("seed.categories"));

        let err = Config::from_toml_str("[db]\npath = \" \"").unwrap_err();
        assert!(err.to_string().contains("db.path"));

        let err = Config::from_toml_str("[db]\npool_size = 0").unwrap_err();
        assert!(err.to_string().contains("db.pool_size"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml_str("[db\npath = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
