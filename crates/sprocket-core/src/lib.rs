//! # Sprocket Core
//!
//! Shared types for the Sprocket skill engine:
//!
//! - [`Event`]: normalized input (message, classification, timer, webhook)
//! - [`Matcher`] / [`MatcherSpec`]: the closed set of skill triggers
//! - [`MatchResult`]: score plus extracted parameters
//! - [`SkillConfig`]: the configuration a skill originates from
//! - [`WebhookEndpoint`] / [`WebhookBinder`]: the boundary to the HTTP layer
//!
//! Nothing in this crate performs I/O; matching is synchronous and pure.

pub mod config;
pub mod error;
pub mod event;
pub mod matcher;
pub mod schedule;
pub mod webhook;

pub use config::SkillConfig;
pub use error::{ConfigurationError, ConfigurationResult};
pub use event::{
    Classification, ClassificationEvent, Event, EventKind, MessageEvent, NluProvider, Params,
    TimerEvent, WebhookEvent,
};
pub use matcher::{
    ALWAYS_SCORE, FIXED_SCORE, MatchResult, Matcher, MatcherSpec, REGEX_SCORE_FACTOR,
    RegexMatcher,
};
pub use schedule::CrontabSchedule;
pub use webhook::{
    BoxedWebhookEndpoint, WebhookBinder, WebhookEndpoint, WebhookResponse, WebhookRoute,
};
