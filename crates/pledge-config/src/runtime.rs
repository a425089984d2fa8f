//! Runtime Configuration (pledge.toml)
//!
//! Handles the scheduler and rejection-diagnostic settings stored in
//! `pledge.toml` (project) or `~/.pledge/config.toml` (global). Both files
//! share this schema.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default number of tasks a single flush may execute
pub const DEFAULT_MAX_TASKS_PER_FLUSH: usize = 1_000_000;

/// Default number of unhandled rejections kept for inspection
pub const DEFAULT_RECORD_LIMIT: usize = 256;

/// Runtime configuration from pledge.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Deferred-task scheduler settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerConfig>,

    /// Unhandled rejection diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejections: Option<RejectionsConfig>,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Maximum tasks executed by one `run_until_idle` call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tasks_per_flush: Option<usize>,
}

/// Rejection diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RejectionsConfig {
    /// Log level for unhandled rejections ("warn", "error", "off")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<RejectionLog>,

    /// How many unhandled rejections the scheduler keeps (0 disables recording)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_limit: Option<usize>,
}

/// How unhandled rejections are written to the log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RejectionLog {
    #[default]
    Warn,
    Error,
    Off,
}

impl fmt::Display for RejectionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionLog::Warn => write!(f, "warn"),
            RejectionLog::Error => write!(f, "error"),
            RejectionLog::Off => write!(f, "off"),
        }
    }
}

impl FromStr for RejectionLog {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" | "warning" => Ok(RejectionLog::Warn),
            "error" => Ok(RejectionLog::Error),
            "off" | "none" => Ok(RejectionLog::Off),
            other => Err(ConfigError::InvalidValue {
                field: "rejections.log".to_string(),
                reason: format!("unknown log level '{}'", other),
            }),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: "<inline>".into(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the runtime configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(scheduler) = &self.scheduler {
            if scheduler.max_tasks_per_flush == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "scheduler.max_tasks_per_flush".to_string(),
                    reason: "budget must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Effective flush budget
    pub fn max_tasks_per_flush(&self) -> usize {
        self.scheduler
            .as_ref()
            .and_then(|s| s.max_tasks_per_flush)
            .unwrap_or(DEFAULT_MAX_TASKS_PER_FLUSH)
    }

    /// Effective unhandled rejection log level
    pub fn rejection_log(&self) -> RejectionLog {
        self.rejections
            .as_ref()
            .and_then(|r| r.log)
            .unwrap_or_default()
    }

    /// Effective unhandled rejection record limit
    pub fn record_limit(&self) -> usize {
        self.rejections
            .as_ref()
            .and_then(|r| r.record_limit)
            .unwrap_or(DEFAULT_RECORD_LIMIT)
    }

    /// Merge another runtime config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &RuntimeConfig) {
        if let Some(other_scheduler) = &other.scheduler {
            let scheduler = self.scheduler.get_or_insert_with(Default::default);
            if other_scheduler.max_tasks_per_flush.is_some() {
                scheduler.max_tasks_per_flush = other_scheduler.max_tasks_per_flush;
            }
        }
        if let Some(other_rejections) = &other.rejections {
            let rejections = self.rejections.get_or_insert_with(Default::default);
            if other_rejections.log.is_some() {
                rejections.log = other_rejections.log;
            }
            if other_rejections.record_limit.is_some() {
                rejections.record_limit = other_rejections.record_limit;
            }
        }
    }
}
