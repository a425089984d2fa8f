//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::runtime::{RejectionLog, RuntimeConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "pledge.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.pledge/config.toml) - lowest priority
/// 2. Project config (./pledge.toml) - overrides global
/// 3. Environment variables (PLEDGE_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Effective runtime configuration
    pub runtime: RuntimeConfig,

    /// Project root directory (where pledge.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader that reads global configuration from an explicit path
    pub fn with_global_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find pledge.toml, then merges it over
    /// the global config if one exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        let mut runtime = self.load_global_config()?;
        runtime.merge(&project_config);

        let runtime = apply_env_overrides(runtime)?;

        Ok(Config {
            runtime,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = RuntimeConfig::load_from_file(config_path)?;

        let mut runtime = self.load_global_config()?;
        runtime.merge(&project_config);

        let runtime = apply_env_overrides(runtime)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            runtime,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); a missing file yields the default config
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, RuntimeConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let config = RuntimeConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, RuntimeConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.pledge/config.toml
    fn load_global_config(&mut self) -> ConfigResult<RuntimeConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match Self::global_config_dir() {
                Ok(dir) => {
                    let path = dir.join("config.toml");
                    self.global_config_path = Some(path.clone());
                    path
                }
                // Without a home directory there is no global config to read
                Err(ConfigError::HomeNotFound) => return Ok(RuntimeConfig::default()),
                Err(e) => return Err(e),
            },
        };

        // Global config is optional
        if !path.exists() {
            return Ok(RuntimeConfig::default());
        }

        RuntimeConfig::load_from_file(&path)
    }

    /// Get the global configuration directory (~/.pledge)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".pledge"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment variable overrides
///
/// Recognised: PLEDGE_MAX_TASKS, PLEDGE_UNHANDLED_LOG, PLEDGE_RECORD_LIMIT
fn apply_env_overrides(mut config: RuntimeConfig) -> ConfigResult<RuntimeConfig> {
    if let Ok(max_tasks) = env::var("PLEDGE_MAX_TASKS") {
        let max_tasks = parse_usize("PLEDGE_MAX_TASKS", &max_tasks)?;
        config
            .scheduler
            .get_or_insert_with(Default::default)
            .max_tasks_per_flush = Some(max_tasks);
    }

    if let Ok(level) = env::var("PLEDGE_UNHANDLED_LOG") {
        let level: RejectionLog = level.parse()?;
        config.rejections.get_or_insert_with(Default::default).log = Some(level);
    }

    if let Ok(limit) = env::var("PLEDGE_RECORD_LIMIT") {
        let limit = parse_usize("PLEDGE_RECORD_LIMIT", &limit)?;
        config
            .rejections
            .get_or_insert_with(Default::default)
            .record_limit = Some(limit);
    }

    config.validate()?;
    Ok(config)
}

fn parse_usize(field: &str, raw: &str) -> ConfigResult<usize> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected a non-negative integer, got '{}'", raw),
    })
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a pledge.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
