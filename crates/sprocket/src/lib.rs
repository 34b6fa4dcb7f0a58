//! # Sprocket
//!
//! A skill matching and dispatch engine for chat bots.
//!
//! ## Overview
//!
//! A skill is a handler bound to a matcher: a regular expression, an intent
//! or action reported by an NLU classifier, a crontab schedule, a webhook
//! path, or an unconditional fallback. Incoming events are normalized and
//! handed to the dispatcher, which picks the skills to run:
//!
//! ```text
//! ┌────────────────┐     ┌────────────┐  best match  ┌───────────────────────┐
//! │ message        │────▶│            │─────────────▶│ regex / NLU / always  │
//! │ classification │────▶│ Dispatcher │              └───────────────────────┘
//! │ timer tick     │────▶│            │  fan-out     ┌───────────────────────┐
//! │ webhook call   │────▶│            │─────────────▶│ crontab / webhook     │
//! └────────────────┘     └────────────┘              └───────────────────────┘
//!                              │
//!                              ▼
//!            ExecutionSupervisor (timeout, failure isolation, counters)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sprocket::prelude::*;
//!
//! async fn hello(MessageText(text): MessageText) {
//!     info!(%text, "Saying hello");
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SprocketRuntime::builder()
//!         .module(skill_module("hello", |r| {
//!             r.regex(r"(?i)^hello\b", hello);
//!         }))
//!         .build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `http-server` *(default)*: the webhook server
//! - `json-log`: JSON log lines

pub use sprocket_core as core;
pub use sprocket_framework as framework;
pub use sprocket_runtime as runtime;
pub use sprocket_transport as transport;

/// Commonly used types for writing skill modules.
///
/// ```rust,ignore
/// use sprocket::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use sprocket_runtime::{SkillModule, SprocketRuntime, skill_module};

    // Registration
    pub use sprocket_framework::{AlwaysOptions, Registrar};

    // Extractors - for handler parameters
    pub use sprocket_framework::{
        FireTime, FromContext, MatchParams, MessageText, Options, Payload, SkillContext, SkillId,
    };

    // Events and matching
    pub use sprocket_core::{
        Classification, Event, MatchResult, MatcherSpec, MessageEvent, NluProvider, SkillConfig,
    };

    // Logging macros
    pub use sprocket_runtime::prelude::*;
}
