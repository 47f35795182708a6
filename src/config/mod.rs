//! Configuration management for the maildex index
//!
//! Loads and validates the TOML configuration that controls where the index
//! lives, how documents are embedded, and how queries are answered.

use crate::error::{MaildexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the index database file
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`
    pub db_file: String,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Expected vector dimensionality of the active provider
    pub dimension: usize,
    /// Documents embedded per provider call during indexing
    pub chunk_size: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum results returned by the semantic and keyword tiers
    pub top_k: usize,
    /// Size of the most-recent-first sampling fallback
    pub sample_size: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MaildexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MaildexError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MaildexError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: MAILDEX_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("MAILDEX_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "EMBEDDING__DIMENSION" => {
                self.embedding.dimension = parse_env(path, value)?;
            }
            "EMBEDDING__CHUNK_SIZE" => {
                self.embedding.chunk_size = parse_env(path, value)?;
            }
            "SEARCH__TOP_K" => {
                self.search.top_k = parse_env(path, value)?;
            }
            "SEARCH__SAMPLE_SIZE" => {
                self.search.sample_size = parse_env(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(MaildexError::InvalidConfigValue {
                path: "embedding.dimension".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.embedding.chunk_size == 0 {
            return Err(MaildexError::InvalidConfigValue {
                path: "embedding.chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.search.top_k == 0 {
            return Err(MaildexError::InvalidConfigValue {
                path: "search.top_k".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.search.sample_size == 0 {
            return Err(MaildexError::InvalidConfigValue {
                path: "search.sample_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| MaildexError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("maildex").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| MaildexError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".maildex"))
    }

    /// Full path to the database file
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.db_file)
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| MaildexError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.maildex"),
                db_file: "index.sqlite".to_string(),
            },
            embedding: EmbeddingConfig {
                dimension: 384,
                chunk_size: 20,
            },
            search: SearchConfig {
                top_k: 20,
                sample_size: 20,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.storage.data_dir = temp.path().to_path_buf();
        config.search.top_k = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.search.top_k, 7);
        assert_eq!(loaded.embedding.dimension, 384);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(MaildexError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut config = Config::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_path() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::from("/tmp/maildex-test");
        assert_eq!(
            config.db_path(),
            PathBuf::from("/tmp/maildex-test/index.sqlite")
        );
    }
}
