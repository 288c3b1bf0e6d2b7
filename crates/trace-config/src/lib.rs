//! Configuration management for the trace capability layer.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then `TRACE_`-prefixed environment variables.

pub mod config;

pub use config::{
    ConfigError, HierarchyConfig, IdConfig, StorageConfig, TraceConfig, load_config,
    load_config_from_env, save_config,
};
