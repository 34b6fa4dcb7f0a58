//! Registration-time error types.
//!
//! Runtime failures of handler code (`HandlerError`, `TimeoutError`) live in
//! `sprocket-framework`, next to the supervisor that captures them.

use thiserror::Error;

/// A matcher specification that cannot be turned into a working matcher.
///
/// Raised while a skill is being registered. The registration helpers log it
/// and skip that single skill; the rest of the registry build carries on.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// The regular expression failed to compile.
    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// The cron expression could not be parsed.
    #[error("invalid crontab '{expression}': {reason}")]
    InvalidCrontab {
        /// The offending expression.
        expression: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The timezone is not a known IANA name.
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    /// The regex score factor is outside `(0, 1]`.
    #[error("score factor {0} is outside (0, 1]")]
    InvalidScoreFactor(f64),

    /// A required field was missing or empty.
    #[error("missing required matcher field: {0}")]
    MissingField(&'static str),
}

impl ConfigurationError {
    /// Creates an invalid regex error.
    pub fn regex(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidRegex {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid crontab error.
    pub fn crontab(expression: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidCrontab {
            expression: expression.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for matcher compilation.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
