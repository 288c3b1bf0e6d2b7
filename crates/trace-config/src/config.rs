//! Configuration types and loading.
//!
//! The main entry point is [`TraceConfig`]. It is loaded with
//! [`load_config`], which layers `figment` providers in this order:
//!
//! 1. built-in defaults,
//! 2. the YAML file, when it exists and is not empty,
//! 3. `TRACE_` environment variables, with `__` separating sections
//!    (`TRACE_HIERARCHY__MAX_DEPTH=32`).

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use trace_core::idgen::adaptive_defaults;
use trace_core::record::DeletePolicy;

/// Prefix of the environment variables read by [`load_config`].
pub const ENV_PREFIX: &str = "TRACE_";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration could not be serialized to YAML.
    #[error("failed to serialize config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A provider produced a value that does not fit the schema.
    #[error("failed to load config: {0}")]
    Extract(#[from] figment::Error),

    /// A configuration value was out of range.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Entity store section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. `None` keeps the store in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How long a writer waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

/// Hierarchy section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Maximum number of levels a traversal may walk before failing.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// What deleting a node with live children does.
    #[serde(default)]
    pub on_delete: DeletePolicy,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            on_delete: DeletePolicy::Protect,
        }
    }
}

fn default_max_depth() -> usize {
    256
}

/// Generated id section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Collision probability tolerated before ids grow longer.
    #[serde(default = "default_max_collision_prob")]
    pub max_collision_prob: f64,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            max_collision_prob: default_max_collision_prob(),
        }
    }
}

fn default_min_length() -> usize {
    adaptive_defaults::MIN_LENGTH
}

fn default_max_length() -> usize {
    adaptive_defaults::MAX_LENGTH
}

fn default_max_collision_prob() -> f64 {
    adaptive_defaults::MAX_COLLISION_PROB
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    #[serde(default)]
    pub ids: IdConfig,
}

impl TraceConfig {
    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.hierarchy.max_depth == 0 {
            return Err(invalid("hierarchy.max_depth", "must be at least 1"));
        }
        if !(3..=8).contains(&self.ids.min_length) || !(3..=8).contains(&self.ids.max_length) {
            return Err(invalid("ids", "lengths must be between 3 and 8"));
        }
        if self.ids.min_length > self.ids.max_length {
            return Err(invalid("ids.min_length", "must not exceed ids.max_length"));
        }
        let p = self.ids.max_collision_prob;
        if !(p > 0.0 && p <= 1.0) {
            return Err(invalid("ids.max_collision_prob", "must be in (0, 1]"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Loads configuration from a YAML file, layered over defaults and under the
/// environment.
///
/// A missing or empty file is not an error.
pub fn load_config(path: &Path) -> Result<TraceConfig> {
    let mut figment = Figment::from(Serialized::defaults(TraceConfig::default()));

    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        if !content.trim().is_empty() {
            figment = figment.merge(Yaml::string(&content));
        }
    }

    extract(figment)
}

/// Loads configuration from defaults and the environment only.
pub fn load_config_from_env() -> Result<TraceConfig> {
    extract(Figment::from(Serialized::defaults(TraceConfig::default())))
}

fn extract(figment: Figment) -> Result<TraceConfig> {
    let config: TraceConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Writes configuration as YAML, creating parent directories as needed.
pub fn save_config(path: &Path, config: &TraceConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
