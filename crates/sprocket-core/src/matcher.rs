//! Matcher variants and their evaluation.
//!
//! A [`Matcher`] decides whether, and how strongly, a skill applies to an
//! [`Event`]. Matchers are compiled from a [`MatcherSpec`] when a skill is
//! registered, so a bad regex or cron expression is reported once, up front,
//! and evaluation itself can never fail.
//!
//! # Scoring
//!
//! | variant        | score                                  |
//! |----------------|----------------------------------------|
//! | `Regex`        | `score_factor` (default 0.6), never 1.0 |
//! | `NluIntent`    | classifier confidence, clamped to [0,1] |
//! | `NluAction`    | classifier confidence, clamped to [0,1] |
//! | `Crontab`      | 1.0                                    |
//! | `Webhook`      | 1.0                                    |
//! | `Always`       | 0.0, in a last-resort tier of its own  |
//!
//! Capping regex at `score_factor` lets a confident NLU classification win
//! over a purely syntactic match of the same utterance.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigurationError, ConfigurationResult};
use crate::event::{Classification, Event, EventKind, NluProvider, Params};
use crate::schedule::CrontabSchedule;

/// Default score of a regex match.
pub const REGEX_SCORE_FACTOR: f64 = 0.6;

/// Score of crontab and webhook matches.
pub const FIXED_SCORE: f64 = 1.0;

/// Score of an `Always` match.
pub const ALWAYS_SCORE: f64 = 0.0;

// =============================================================================
// MatchResult
// =============================================================================

/// The outcome of a successful [`Matcher::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Score in `[0, 1]`, comparable across variants.
    pub score: f64,
    /// Parameters extracted from the event.
    pub params: Params,
}

impl MatchResult {
    /// Creates a result with no parameters.
    pub fn new(score: f64) -> Self {
        Self {
            score,
            params: Params::new(),
        }
    }

    /// Adds a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Returns a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

// =============================================================================
// MatcherSpec
// =============================================================================

/// The configuration of a matcher, before validation.
///
/// This is the shape used in configuration files:
///
/// ```yaml
/// matcher: { type: regex, pattern: "^hello$", case_sensitive: false }
/// matcher: { type: crontab, schedule: "*/5 * * * *", timezone: Europe/Paris }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherSpec {
    /// Regular-expression match on the message text.
    Regex {
        /// The expression.
        pattern: String,
        /// Whether matching is case sensitive.
        #[serde(default = "default_true")]
        case_sensitive: bool,
        /// Score of a match; [`REGEX_SCORE_FACTOR`] when absent.
        #[serde(default)]
        score_factor: Option<f64>,
    },
    /// NLU intent match.
    NluIntent {
        /// The classifying back-end.
        provider: NluProvider,
        /// The intent identifier.
        intent_id: String,
    },
    /// NLU action match.
    NluAction {
        /// The classifying back-end.
        provider: NluProvider,
        /// The action identifier.
        action_id: String,
    },
    /// Timer match.
    Crontab {
        /// Cron expression.
        schedule: String,
        /// IANA timezone name; UTC when absent.
        #[serde(default)]
        timezone: Option<String>,
    },
    /// Inbound webhook match.
    Webhook {
        /// Last path segment of `/skill/{name}/{segment}`.
        path_segment: String,
    },
    /// Catch-all match for conversational events.
    Always {
        /// A disabled `Always` matcher never matches.
        #[serde(default = "default_true")]
        enabled: bool,
    },
}

fn default_true() -> bool {
    true
}

impl MatcherSpec {
    /// A case-sensitive regex with the default score factor.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
            case_sensitive: true,
            score_factor: None,
        }
    }

    /// An NLU intent matcher.
    pub fn nlu_intent(provider: impl Into<NluProvider>, intent_id: impl Into<String>) -> Self {
        Self::NluIntent {
            provider: provider.into(),
            intent_id: intent_id.into(),
        }
    }

    /// An NLU action matcher.
    pub fn nlu_action(provider: impl Into<NluProvider>, action_id: impl Into<String>) -> Self {
        Self::NluAction {
            provider: provider.into(),
            action_id: action_id.into(),
        }
    }

    /// A crontab matcher evaluated in UTC.
    pub fn crontab(schedule: impl Into<String>) -> Self {
        Self::Crontab {
            schedule: schedule.into(),
            timezone: None,
        }
    }

    /// A webhook matcher.
    pub fn webhook(path_segment: impl Into<String>) -> Self {
        Self::Webhook {
            path_segment: path_segment.into(),
        }
    }

    /// An enabled catch-all matcher.
    pub fn always() -> Self {
        Self::Always { enabled: true }
    }

    /// Validates the descriptor and builds the matcher.
    pub fn compile(self) -> ConfigurationResult<Matcher> {
        match self {
            Self::Regex {
                pattern,
                case_sensitive,
                score_factor,
            } => {
                let score_factor = score_factor.unwrap_or(REGEX_SCORE_FACTOR);
                if !(score_factor > 0.0 && score_factor <= 1.0) {
                    return Err(ConfigurationError::InvalidScoreFactor(score_factor));
                }
                if pattern.is_empty() {
                    return Err(ConfigurationError::MissingField("regex"));
                }
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| ConfigurationError::regex(&pattern, e))?;
                Ok(Matcher::Regex(RegexMatcher {
                    regex,
                    case_sensitive,
                    score_factor,
                }))
            }
            Self::NluIntent {
                provider,
                intent_id,
            } => {
                if intent_id.is_empty() {
                    return Err(ConfigurationError::MissingField("intent_id"));
                }
                Ok(Matcher::NluIntent {
                    provider,
                    intent_id,
                })
            }
            Self::NluAction {
                provider,
                action_id,
            } => {
                if action_id.is_empty() {
                    return Err(ConfigurationError::MissingField("action_id"));
                }
                Ok(Matcher::NluAction {
                    provider,
                    action_id,
                })
            }
            Self::Crontab { schedule, timezone } => Ok(Matcher::Crontab(CrontabSchedule::parse(
                &schedule,
                timezone.as_deref(),
            )?)),
            Self::Webhook { path_segment } => {
                if path_segment.is_empty() || path_segment.contains('/') {
                    return Err(ConfigurationError::MissingField("path_segment"));
                }
                Ok(Matcher::Webhook { path_segment })
            }
            Self::Always { enabled } => Ok(Matcher::Always { enabled }),
        }
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// A compiled regex matcher.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    case_sensitive: bool,
    score_factor: f64,
}

impl RegexMatcher {
    /// The source pattern.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether matching is case sensitive.
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// The score every match of this matcher receives.
    pub fn score_factor(&self) -> f64 {
        self.score_factor
    }

    fn evaluate(&self, text: &str) -> Option<MatchResult> {
        let captures = self.regex.captures(text)?;
        let mut result = MatchResult::new(self.score_factor);

        for (i, group) in captures.iter().enumerate() {
            let value = group.map_or(Value::Null, |m| Value::from(m.as_str()));
            result.params.insert(i.to_string(), value);
        }
        for name in self.regex.capture_names().flatten() {
            let value = captures
                .name(name)
                .map_or(Value::Null, |m| Value::from(m.as_str()));
            result.params.insert(name.to_string(), value);
        }

        Some(result)
    }
}

/// A validated matcher, one variant per kind of trigger.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Regular-expression match on message text.
    Regex(RegexMatcher),
    /// NLU intent match.
    NluIntent {
        /// The classifying back-end.
        provider: NluProvider,
        /// The intent identifier.
        intent_id: String,
    },
    /// NLU action match.
    NluAction {
        /// The classifying back-end.
        provider: NluProvider,
        /// The action identifier.
        action_id: String,
    },
    /// Timer match.
    Crontab(CrontabSchedule),
    /// Inbound webhook match.
    Webhook {
        /// Last path segment of `/skill/{name}/{segment}`.
        path_segment: String,
    },
    /// Catch-all for conversational events.
    Always {
        /// A disabled `Always` matcher never matches.
        enabled: bool,
    },
}

impl Matcher {
    /// Evaluates this matcher against `event`.
    ///
    /// Pure and non-blocking: the same `(matcher, event)` pair always yields
    /// the same result.
    pub fn evaluate(&self, event: &Event) -> Option<MatchResult> {
        match self {
            Self::Regex(regex) => regex.evaluate(event.text()?),
            Self::NluIntent {
                provider,
                intent_id,
            } => best_classification(event, provider, |c| {
                c.intent.as_deref() == Some(intent_id.as_str())
            }),
            Self::NluAction {
                provider,
                action_id,
            } => best_classification(event, provider, |c| {
                c.action.as_deref() == Some(action_id.as_str())
            }),
            Self::Crontab(schedule) => match event {
                Event::Timer(timer) => schedule.occurrence(timer.fire_time).map(|tick| {
                    MatchResult::new(FIXED_SCORE).with_param("fire_time", tick.to_rfc3339())
                }),
                _ => None,
            },
            Self::Webhook { path_segment } => match event {
                Event::WebhookCall(hook) if hook.path_segment == *path_segment => Some(
                    MatchResult::new(FIXED_SCORE).with_param("payload", hook.payload.clone()),
                ),
                _ => None,
            },
            Self::Always { enabled } => {
                (*enabled && event.is_conversational()).then(|| MatchResult::new(ALWAYS_SCORE))
            }
        }
    }

    /// Whether this matcher can ever match events of `kind`.
    pub fn accepts(&self, kind: EventKind) -> bool {
        match self {
            Self::Regex(_)
            | Self::NluIntent { .. }
            | Self::NluAction { .. }
            | Self::Always { .. } => kind.is_conversational(),
            Self::Crontab(_) => kind == EventKind::Timer,
            Self::Webhook { .. } => kind == EventKind::WebhookCall,
        }
    }

    /// Whether this is the last-resort `Always` matcher.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Always { .. })
    }

    /// Returns the webhook path segment, if this is a webhook matcher.
    pub fn webhook_segment(&self) -> Option<&str> {
        match self {
            Self::Webhook { path_segment } => Some(path_segment),
            _ => None,
        }
    }

    /// Short variant name used in logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Regex(_) => "regex",
            Self::NluIntent { .. } => "nlu_intent",
            Self::NluAction { .. } => "nlu_action",
            Self::Crontab(_) => "crontab",
            Self::Webhook { .. } => "webhook",
            Self::Always { .. } => "always",
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(regex) => write!(f, "regex({:?})", regex.pattern()),
            Self::NluIntent {
                provider,
                intent_id,
            } => write!(f, "{provider}_intent({intent_id})"),
            Self::NluAction {
                provider,
                action_id,
            } => write!(f, "{provider}_action({action_id})"),
            Self::Crontab(schedule) => write!(
                f,
                "crontab({:?}, {})",
                schedule.expression(),
                schedule.timezone().name()
            ),
            Self::Webhook { path_segment } => write!(f, "webhook({path_segment})"),
            Self::Always { .. } => f.write_str("always"),
        }
    }
}

/// Picks the most confident qualifying classification (first one on ties).
fn best_classification<F>(event: &Event, provider: &NluProvider, pred: F) -> Option<MatchResult>
where
    F: Fn(&Classification) -> bool,
{
    let mut best: Option<&Classification> = None;
    for c in event.classifications() {
        if c.provider != *provider || !pred(c) {
            continue;
        }
        if best.is_none_or(|b| clamp_confidence(c.confidence) > clamp_confidence(b.confidence)) {
            best = Some(c);
        }
    }

    best.map(|c| MatchResult {
        score: clamp_confidence(c.confidence),
        params: c.slots.clone(),
    })
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClassificationEvent, MessageEvent};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn compile(spec: MatcherSpec) -> Matcher {
        spec.compile().unwrap()
    }

    #[test]
    fn test_regex_scores_score_factor_even_on_exact_match() {
        let matcher = compile(MatcherSpec::regex("^hello$"));
        let result = matcher.evaluate(&Event::message("hello")).unwrap();
        assert_eq!(result.score, REGEX_SCORE_FACTOR);
        assert_ne!(result.score, 1.0);
    }

    #[test]
    fn test_regex_custom_score_factor() {
        let matcher = compile(MatcherSpec::Regex {
            pattern: "ping".into(),
            case_sensitive: true,
            score_factor: Some(0.25),
        });
        assert_eq!(matcher.evaluate(&Event::message("ping")).unwrap().score, 0.25);
    }

    #[test]
    fn test_regex_case_folding() {
        let sensitive = compile(MatcherSpec::regex("^hello$"));
        assert!(sensitive.evaluate(&Event::message("Hello")).is_none());

        let insensitive = compile(MatcherSpec::Regex {
            pattern: "^hello$".into(),
            case_sensitive: false,
            score_factor: None,
        });
        assert!(insensitive.evaluate(&Event::message("Hello")).is_some());
    }

    #[test]
    fn test_regex_captures() {
        let matcher = compile(MatcherSpec::regex(r"remind me to (?P<task>\w+)( later)?"));
        let result = matcher
            .evaluate(&Event::message("remind me to stretch"))
            .unwrap();
        assert_eq!(result.param("0"), Some(&json!("remind me to stretch")));
        assert_eq!(result.param("1"), Some(&json!("stretch")));
        assert_eq!(result.param("task"), Some(&json!("stretch")));
        assert_eq!(result.param("2"), Some(&Value::Null));
    }

    #[test]
    fn test_regex_ignores_timer_and_webhook_events() {
        let matcher = compile(MatcherSpec::regex(".*"));
        assert!(matcher.evaluate(&Event::timer(Utc::now())).is_none());
        assert!(matcher.evaluate(&Event::webhook("x", json!("x"))).is_none());
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        assert!(matches!(
            MatcherSpec::regex("(unclosed").compile(),
            Err(ConfigurationError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_invalid_score_factor_is_rejected() {
        for factor in [0.0, -0.1, 1.5, f64::NAN] {
            let spec = MatcherSpec::Regex {
                pattern: "x".into(),
                case_sensitive: true,
                score_factor: Some(factor),
            };
            assert!(matches!(
                spec.compile(),
                Err(ConfigurationError::InvalidScoreFactor(_))
            ));
        }
    }

    #[test]
    fn test_nlu_intent_uses_confidence_and_slots() {
        let matcher = compile(MatcherSpec::nlu_intent("demo", "greet"));
        let event = Event::classification(
            Classification::intent("demo", "greet", 0.95).with_slot("name", "ada"),
        );
        let result = matcher.evaluate(&event).unwrap();
        assert_eq!(result.score, 0.95);
        assert_eq!(result.param("name"), Some(&json!("ada")));
    }

    #[test]
    fn test_nlu_requires_matching_provider_and_id() {
        let matcher = compile(MatcherSpec::nlu_intent(NluProvider::Wit, "greet"));
        let other_provider = Event::classification(Classification::intent("luisai", "greet", 0.9));
        let other_intent = Event::classification(Classification::intent("witai", "bye", 0.9));
        assert!(matcher.evaluate(&other_provider).is_none());
        assert!(matcher.evaluate(&other_intent).is_none());
        assert!(matcher.evaluate(&Event::message("greet")).is_none());
    }

    #[test]
    fn test_nlu_action() {
        let matcher = compile(MatcherSpec::nlu_action(NluProvider::Dialogflow, "smalltalk.greet"));
        let event = Event::classification(
            Classification::intent("dialogflow", "Default Welcome", 0.7)
                .with_action("smalltalk.greet"),
        );
        assert_eq!(matcher.evaluate(&event).unwrap().score, 0.7);
    }

    #[test]
    fn test_nlu_confidence_is_clamped() {
        let matcher = compile(MatcherSpec::nlu_intent("demo", "greet"));
        let high = Event::classification(Classification::intent("demo", "greet", 3.0));
        let low = Event::classification(Classification::intent("demo", "greet", -1.0));
        let nan = Event::classification(Classification::intent("demo", "greet", f64::NAN));
        assert_eq!(matcher.evaluate(&high).unwrap().score, 1.0);
        assert_eq!(matcher.evaluate(&low).unwrap().score, 0.0);
        assert_eq!(matcher.evaluate(&nan).unwrap().score, 0.0);
    }

    #[test]
    fn test_nlu_on_message_with_attached_classifications() {
        let matcher = compile(MatcherSpec::nlu_intent("demo", "greet"));
        let event = Event::Message(
            MessageEvent::new("hi")
                .classified(Classification::intent("demo", "greet", 0.4))
                .classified(Classification::intent("demo", "greet", 0.8)),
        );
        assert_eq!(matcher.evaluate(&event).unwrap().score, 0.8);
    }

    #[test]
    fn test_regex_sees_text_of_classified_message() {
        let matcher = compile(MatcherSpec::regex("hi"));
        let event = Event::Classification(ClassificationEvent {
            classification: Classification::intent("demo", "greet", 0.4),
            message: Some(MessageEvent::new("hi")),
        });
        assert!(matcher.evaluate(&event).is_some());
    }

    #[test]
    fn test_crontab_matches_timer_only() {
        let matcher = compile(MatcherSpec::crontab("*/5 * * * *"));
        let tick = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        let result = matcher.evaluate(&Event::timer(tick)).unwrap();
        assert_eq!(result.score, FIXED_SCORE);
        assert_eq!(
            result.param("fire_time"),
            Some(&json!("2024-01-01T00:05:00+00:00"))
        );
        assert!(matcher.evaluate(&Event::message("*/5")).is_none());
    }

    #[test]
    fn test_webhook_exact_segment() {
        let matcher = compile(MatcherSpec::webhook("ping"));
        let result = matcher
            .evaluate(&Event::webhook("ping", json!({"a": 1})))
            .unwrap();
        assert_eq!(result.score, FIXED_SCORE);
        assert_eq!(result.param("payload"), Some(&json!({"a": 1})));
        assert!(matcher.evaluate(&Event::webhook("pin", json!(null))).is_none());
        assert!(matcher.evaluate(&Event::webhook("ping2", json!(null))).is_none());
    }

    #[test]
    fn test_webhook_segment_validation() {
        assert!(MatcherSpec::webhook("").compile().is_err());
        assert!(MatcherSpec::webhook("a/b").compile().is_err());
    }

    #[test]
    fn test_always() {
        let matcher = compile(MatcherSpec::always());
        assert_eq!(
            matcher.evaluate(&Event::message("anything")).unwrap().score,
            ALWAYS_SCORE
        );
        assert!(matcher.evaluate(&Event::timer(Utc::now())).is_none());

        let disabled = compile(MatcherSpec::Always { enabled: false });
        assert!(disabled.evaluate(&Event::message("anything")).is_none());
    }

    #[test]
    fn test_spec_deserializes_from_config_shape() {
        let spec: MatcherSpec = serde_json::from_value(json!({
            "type": "regex",
            "pattern": "^hi$",
        }))
        .unwrap();
        assert_eq!(spec, MatcherSpec::regex("^hi$"));

        let spec: MatcherSpec = serde_json::from_value(json!({
            "type": "nlu_intent",
            "provider": "apiai",
            "intent_id": "greet",
        }))
        .unwrap();
        assert_eq!(spec, MatcherSpec::nlu_intent(NluProvider::Dialogflow, "greet"));
    }
}
