//! Sprocket Runtime - Orchestration layer for the Sprocket skill engine.
//!
//! This crate provides:
//! - Configuration loading and validation (`ConfigLoader`, `SprocketConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - Skill modules and loading (`SkillModule`, `SkillLoader`)
//! - The minute ticker behind crontab skills (`CronTicker`)
//! - Runtime orchestration (`SprocketRuntime`)
//!
//! ```ignore
//! use sprocket_runtime::{SprocketRuntime, skill_module};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SprocketRuntime::builder()
//!         .module(skill_module("hello", |r| {
//!             r.regex(r"^hello$", greet);
//!         }))
//!         .build()?;
//!
//!     // Serves webhooks and ticks crontabs until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod module;
pub mod runtime;
pub mod ticker;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DispatchConfig, LoggingConfig, SprocketConfig,
    WebConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use module::{FnModule, LoadReport, SkillLoader, SkillModule, skill_module};
pub use runtime::{RuntimeBuilder, SprocketRuntime};
pub use ticker::CronTicker;

// Re-export tracing for use by skill modules
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for skill modules.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
