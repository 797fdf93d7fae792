//! Configuration management for the RAX object store
//!
//! Loads storage settings from an optional `config.toml` with `RAX_STORE_*`
//! environment overrides.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_BASE_DIR: &str = "./storage";
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Environment variable naming an alternate config file
pub const CONFIG_PATH_ENV: &str = "RAX_STORE_CONFIG";

/// Storage configuration, immutable once an adapter is built from it
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Root directory of the object namespace
    /// Environment: RAX_STORE_BASE_DIR
    pub base_dir: String,

    /// Chunk size for streaming copies
    pub buffer_size: usize,

    /// Reject keys that resolve outside `base_dir`
    pub strict_paths: bool,

    /// Create `base_dir` when the adapter is built from this config
    pub create_base: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: DEFAULT_BASE_DIR.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            strict_paths: false,
            create_base: true,
        }
    }
}

impl StorageConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration from the named file (extension optional) with environment overrides
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .set_default("base_dir", DEFAULT_BASE_DIR)?
            .set_default("buffer_size", DEFAULT_BUFFER_SIZE as i64)?
            .set_default("strict_paths", false)?
            .set_default("create_base", true)?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("RAX_STORE").try_parsing(true))
            .build()?;

        let config: StorageConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Config with defaults rooted at `base_dir`
    pub fn with_base(base_dir: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.base_dir.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "base_dir cannot be empty".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get base directory as PathBuf
    pub fn base_path(&self) -> PathBuf {
        PathBuf::from(&self.base_dir)
    }
}
