//! Error types for the Sprocket framework.

use std::time::Duration;

use thiserror::Error;

use crate::skill::{Skill, SkillId};

/// Boxed error type carried through handler services.
pub type BoxError = tower::BoxError;

/// Errors that can occur while extracting handler arguments.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The event is not of the kind the extractor needs.
    #[error("event kind mismatch: expected '{expected}', got '{got}'")]
    EventKindMismatch {
        /// Expected kind.
        expected: &'static str,
        /// Actual kind.
        got: &'static str,
    },

    /// The match result does not carry the requested parameter.
    #[error("missing match parameter '{0}'")]
    MissingParam(String),

    /// The skill's options could not be deserialized.
    #[error("invalid skill options: {0}")]
    InvalidOptions(String),

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// A handler panicked while running.
#[derive(Debug, Clone, Error)]
#[error("handler panicked: {0}")]
pub struct HandlerPanic(pub String);

/// Handler code failed: it returned an error, panicked, or its arguments
/// could not be extracted.
#[derive(Debug, Clone, Error)]
#[error("skill '{skill_name}' ({skill}) failed: {cause}")]
pub struct HandlerError {
    /// The failing skill.
    pub skill: SkillId,
    /// Config name of the failing skill.
    pub skill_name: String,
    /// Rendered cause.
    pub cause: String,
}

impl HandlerError {
    /// Creates an error for `skill` from any cause.
    pub fn new(skill: &Skill, cause: impl std::fmt::Display) -> Self {
        Self {
            skill: skill.id(),
            skill_name: skill.config().name.clone(),
            cause: cause.to_string(),
        }
    }
}

/// A handler exceeded its time budget and was cancelled.
#[derive(Debug, Clone, Error)]
#[error("skill '{skill_name}' ({skill}) timed out after {budget:?}")]
pub struct TimeoutError {
    /// The cancelled skill.
    pub skill: SkillId,
    /// Config name of the cancelled skill.
    pub skill_name: String,
    /// The budget that was exceeded.
    pub budget: Duration,
}

impl TimeoutError {
    /// Creates a timeout error for `skill`.
    pub fn new(skill: &Skill, budget: Duration) -> Self {
        Self {
            skill: skill.id(),
            skill_name: skill.config().name.clone(),
            budget,
        }
    }
}
