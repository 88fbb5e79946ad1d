//! Application configuration for Graft.
//!
//! [`AppConfig`] is read from an optional `graft.toml` with
//! `GRAFT__SECTION__KEY` environment overrides and validated before use.

pub mod config;
pub mod observability;

pub use crate::config::loader::{DEFAULT_CONFIG_FILE, load_config, load_config_with_default_path};
pub use crate::config::{AppConfig, LoggingConfig, MappingSettings};
pub use observability::{apply_logging_level, init_tracing_from, init_tracing_with_level};
