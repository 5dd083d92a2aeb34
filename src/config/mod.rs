//! Configuration Module
//!
//! TOML configuration loading and startup validation.

pub mod loader;

pub use loader::{load_config, Config, ConfigError};
