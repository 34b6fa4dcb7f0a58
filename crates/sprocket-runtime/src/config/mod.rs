//! Configuration module for the Sprocket runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging, dispatch, the webhook server and the skill list.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
    SprocketConfig, WebConfig,
};
pub use validation::validate_config;
