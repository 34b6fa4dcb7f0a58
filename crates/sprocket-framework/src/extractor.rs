//! Extractor system for handler arguments.
//!
//! Any type implementing [`FromContext`] can appear as a handler parameter.
//! Extraction failures are reported as handler failures of that skill; they
//! never reach the dispatcher's caller.
//!
//! ```rust,ignore
//! async fn remind(MessageText(text): MessageText, MatchParams(params): MatchParams) {
//!     // ...
//! }
//!
//! async fn hook(Payload(body): Payload, config: SkillConfig) -> anyhow::Result<()> {
//!     // ...
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::SkillContext;
use crate::error::{ExtractError, ExtractResult};
use crate::skill::SkillId;
use sprocket_core::{Event, MatchResult, MessageEvent, Params, SkillConfig};

/// A type that can be extracted from a [`SkillContext`].
pub trait FromContext: Sized {
    /// Attempts to extract this type from the context.
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self>;
}

/// Optional parameters never fail.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

impl FromContext for Arc<Event> {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(ctx.event_arc())
    }
}

impl FromContext for Event {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(ctx.event().clone())
    }
}

impl FromContext for SkillId {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(ctx.skill())
    }
}

/// The full match result: score and parameters.
impl FromContext for MatchResult {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(ctx.result().clone())
    }
}

/// The skill's origin configuration.
impl FromContext for SkillConfig {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(ctx.config().as_ref().clone())
    }
}

impl FromContext for Arc<SkillConfig> {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(Arc::clone(ctx.config()))
    }
}

/// The message of a message event, or of a classification that carries one.
impl FromContext for MessageEvent {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        ctx.event()
            .as_message()
            .cloned()
            .ok_or_else(|| ExtractError::EventKindMismatch {
                expected: "message",
                got: ctx.event().kind().as_str(),
            })
    }
}

/// Parameters extracted by the matcher (regex groups, NLU slots, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct MatchParams(pub Params);

impl FromContext for MatchParams {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        Ok(Self(ctx.result().params.clone()))
    }
}

/// The text of the triggering message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageText(pub String);

impl FromContext for MessageText {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        ctx.event()
            .text()
            .map(|text| Self(text.to_string()))
            .ok_or_else(|| ExtractError::EventKindMismatch {
                expected: "message",
                got: ctx.event().kind().as_str(),
            })
    }
}

/// The body of the triggering webhook call.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(pub Value);

impl FromContext for Payload {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        ctx.result()
            .param("payload")
            .cloned()
            .map(Self)
            .ok_or_else(|| ExtractError::MissingParam("payload".into()))
    }
}

/// The crontab tick, in the timezone of the skill's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireTime(pub DateTime<FixedOffset>);

impl FromContext for FireTime {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        let raw = ctx
            .result()
            .param("fire_time")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtractError::MissingParam("fire_time".into()))?;
        DateTime::parse_from_rfc3339(raw)
            .map(Self)
            .map_err(|e| ExtractError::custom(format!("invalid fire_time '{raw}': {e}")))
    }
}

/// The skill's free-form options, deserialized into `T`.
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct GreeterOptions { greeting: String }
///
/// async fn greet(Options(opts): Options<GreeterOptions>) { /* ... */ }
/// ```
#[derive(Debug, Clone)]
pub struct Options<T>(pub T);

impl<T: DeserializeOwned> FromContext for Options<T> {
    fn from_context(ctx: &SkillContext) -> ExtractResult<Self> {
        serde_json::from_value(Value::Object(ctx.config().options.clone()))
            .map(Self)
            .map_err(|e| ExtractError::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use sprocket_core::Classification;

    fn ctx(event: Event, result: MatchResult, config: SkillConfig) -> SkillContext {
        SkillContext::new(SkillId(7), Arc::new(event), result, Arc::new(config))
    }

    #[test]
    fn test_message_text() {
        let c = ctx(
            Event::message("hello"),
            MatchResult::new(0.6),
            SkillConfig::new("demo"),
        );
        assert_eq!(MessageText::from_context(&c).unwrap().0, "hello");
        assert_eq!(SkillId::from_context(&c).unwrap(), SkillId(7));
    }

    #[test]
    fn test_message_text_fails_on_bare_classification() {
        let c = ctx(
            Event::classification(Classification::intent("demo", "greet", 0.9)),
            MatchResult::new(0.9),
            SkillConfig::new("demo"),
        );
        assert!(matches!(
            MessageText::from_context(&c),
            Err(ExtractError::EventKindMismatch { expected: "message", got: "classification" })
        ));
        assert_eq!(Option::<MessageText>::from_context(&c).unwrap(), None);
    }

    #[test]
    fn test_payload_and_params() {
        let result = MatchResult::new(1.0).with_param("payload", json!({"x": 1}));
        let c = ctx(
            Event::webhook("ping", json!({"x": 1})),
            result,
            SkillConfig::new("demo"),
        );
        assert_eq!(Payload::from_context(&c).unwrap().0, json!({"x": 1}));
        assert_eq!(
            MatchParams::from_context(&c).unwrap().0.get("payload"),
            Some(&json!({"x": 1}))
        );
        assert!(FireTime::from_context(&c).is_err());
    }

    #[test]
    fn test_fire_time() {
        let result = MatchResult::new(1.0).with_param("fire_time", "2024-05-01T09:00:00+01:00");
        let c = ctx(
            Event::timer(chrono::Utc::now()),
            result,
            SkillConfig::new("demo"),
        );
        let FireTime(t) = FireTime::from_context(&c).unwrap();
        assert_eq!(t.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_options() {
        #[derive(Deserialize)]
        struct GreeterOptions {
            greeting: String,
        }

        let config = SkillConfig::new("demo").with_option("greeting", "howdy");
        let c = ctx(Event::message("hi"), MatchResult::new(0.6), config);
        let Options(opts) = Options::<GreeterOptions>::from_context(&c).unwrap();
        assert_eq!(opts.greeting, "howdy");

        let bare = ctx(
            Event::message("hi"),
            MatchResult::new(0.6),
            SkillConfig::new("demo"),
        );
        assert!(matches!(
            Options::<GreeterOptions>::from_context(&bare),
            Err(ExtractError::InvalidOptions(_))
        ));
    }
}
