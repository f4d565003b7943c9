//! partload configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the loader configuration file (TOML or JSON)
//! - Config resolution (CLI → env → XDG default)
//! - Semantic validation that reports every problem at once

pub mod loader;
pub mod resolve;
pub mod validate;

pub use loader::{ArchiveConfig, BuilderConfig, ConfigError, LoaderConfig};
pub use resolve::{resolve_config_path, ConfigSource, CONFIG_ENV_VAR};
pub use validate::{validate, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
