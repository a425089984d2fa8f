//! Pledge Configuration System
//!
//! Provides configuration for the Pledge runtime:
//! - Runtime configuration (pledge.toml)
//! - Global user configuration (~/.pledge/config.toml)
//! - Environment overrides (PLEDGE_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.pledge/config.toml)
//! 2. Project config (./pledge.toml)
//! 3. Environment variables (PLEDGE_*)
//!
//! # Example
//!
//! ```no_run
//! use pledge_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("flush budget: {}", config.runtime.max_tasks_per_flush());
//! ```

pub mod loader;
pub mod runtime;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader};
pub use runtime::{
    RejectionLog, RejectionsConfig, RuntimeConfig, SchedulerConfig, DEFAULT_MAX_TASKS_PER_FLUSH,
    DEFAULT_RECORD_LIMIT,
};
