//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    Config, ConfigError, EquitiesSection, LoggingSection, MoversSection, ProvidersSection,
    ProxySection, ScheduleSection, DEFAULT_CONFIG_PATH, expand_path, load_config, load_or_default,
};
