//! Normalized events consumed by the dispatch engine.
//!
//! Connectors, NLU clients, the webhook server and the cron ticker all turn
//! what they receive into one [`Event`]. Once built, an event is never mutated;
//! matchers copy whatever they derive from it into their
//! [`MatchResult`](crate::matcher::MatchResult).
//!
//! ```text
//! Event
//! ├── Message         { text, sender, connector, classifications }
//! ├── Classification  { classification, message? }
//! ├── Timer           { fire_time }
//! └── WebhookCall     { skill_name?, path_segment, payload }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Once;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Named values extracted from an event (regex groups, NLU slots, ...).
pub type Params = BTreeMap<String, Value>;

static APIAI_PROVIDER_WARNING: Once = Once::new();

// =============================================================================
// NLU providers
// =============================================================================

/// An NLU back-end that can classify messages upstream of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NluProvider {
    /// Dialogflow (formerly Api.ai).
    Dialogflow,
    /// Microsoft LUIS.
    Luis,
    /// Rasa NLU.
    RasaNlu,
    /// Recast.AI.
    Recast,
    /// Wit.ai.
    Wit,
    /// Any other back-end, identified by name.
    Custom(String),
}

impl NluProvider {
    /// Returns the canonical provider name.
    pub fn name(&self) -> &str {
        match self {
            Self::Dialogflow => "dialogflow",
            Self::Luis => "luisai",
            Self::RasaNlu => "rasanlu",
            Self::Recast => "recastai",
            Self::Wit => "witai",
            Self::Custom(name) => name,
        }
    }

    /// Resolves a provider from its name.
    ///
    /// `apiai` is still understood as Dialogflow, with a one-time warning.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "dialogflow" => Self::Dialogflow,
            "apiai" => {
                APIAI_PROVIDER_WARNING.call_once(|| {
                    warn!(
                        "Provider name 'apiai' is deprecated, Api.ai is now called Dialogflow; \
                         use 'dialogflow' instead"
                    );
                });
                Self::Dialogflow
            }
            "luisai" | "luis" => Self::Luis,
            "rasanlu" | "rasa" => Self::RasaNlu,
            "recastai" | "recast" => Self::Recast,
            "witai" | "wit" => Self::Wit,
            _ => Self::Custom(name.to_string()),
        }
    }
}

impl From<String> for NluProvider {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<&str> for NluProvider {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<NluProvider> for String {
    fn from(provider: NluProvider) -> Self {
        provider.name().to_string()
    }
}

impl fmt::Display for NluProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Classification
// =============================================================================

/// The output of an upstream NLU classifier for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The back-end that produced this result.
    pub provider: NluProvider,
    /// Intent identifier, if the provider reports one.
    #[serde(default)]
    pub intent: Option<String>,
    /// Action identifier, if the provider reports one.
    #[serde(default)]
    pub action: Option<String>,
    /// Confidence reported by the classifier. Not guaranteed to be in `[0, 1]`.
    pub confidence: f64,
    /// Slots / entities reported by the classifier.
    #[serde(default)]
    pub slots: Params,
}

impl Classification {
    /// Creates a classification naming an intent.
    pub fn intent(
        provider: impl Into<NluProvider>,
        intent: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            intent: Some(intent.into()),
            action: None,
            confidence,
            slots: Params::new(),
        }
    }

    /// Creates a classification naming an action.
    pub fn action(
        provider: impl Into<NluProvider>,
        action: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            intent: None,
            action: Some(action.into()),
            confidence,
            slots: Params::new(),
        }
    }

    /// Adds a slot value.
    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }

    /// Sets the action alongside an intent (Dialogflow reports both).
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

// =============================================================================
// Event payloads
// =============================================================================

/// A chat message received by a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Message text.
    pub text: String,
    /// Sender identity as reported by the connector.
    #[serde(default)]
    pub sender: String,
    /// Name of the connector that produced the message.
    #[serde(default)]
    pub connector: String,
    /// Classifications attached upstream, before dispatch.
    #[serde(default)]
    pub classifications: Vec<Classification>,
}

impl MessageEvent {
    /// Creates a message with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: String::new(),
            connector: String::new(),
            classifications: Vec::new(),
        }
    }

    /// Sets the sender.
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Sets the connector name.
    pub fn connector(mut self, connector: impl Into<String>) -> Self {
        self.connector = connector.into();
        self
    }

    /// Attaches a classification result.
    pub fn classified(mut self, classification: Classification) -> Self {
        self.classifications.push(classification);
        self
    }
}

/// A classification result dispatched on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEvent {
    /// The classifier output.
    pub classification: Classification,
    /// The message that was classified, when known.
    #[serde(default)]
    pub message: Option<MessageEvent>,
}

/// A timer tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEvent {
    /// The instant the tick fired.
    pub fire_time: DateTime<Utc>,
}

/// An inbound webhook call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Config name of the skill addressed by the URL, when routed by name.
    #[serde(default)]
    pub skill_name: Option<String>,
    /// The last path segment of `/skill/{name}/{segment}`.
    pub path_segment: String,
    /// Request body, unparsed by the engine.
    #[serde(default)]
    pub payload: Value,
}

// =============================================================================
// Event
// =============================================================================

/// The kind of an [`Event`], without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::Message`].
    Message,
    /// [`Event::Classification`].
    Classification,
    /// [`Event::Timer`].
    Timer,
    /// [`Event::WebhookCall`].
    WebhookCall,
}

impl EventKind {
    /// Returns the kind name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Classification => "classification",
            Self::Timer => "timer",
            Self::WebhookCall => "webhook_call",
        }
    }

    /// Whether events of this kind use "best-of" selection.
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::Message | Self::Classification)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized, read-only event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A chat message.
    Message(MessageEvent),
    /// An NLU classification.
    Classification(ClassificationEvent),
    /// A timer tick.
    Timer(TimerEvent),
    /// An inbound webhook call.
    WebhookCall(WebhookEvent),
}

impl Event {
    /// Creates a message event with only text set.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(MessageEvent::new(text))
    }

    /// Creates a classification event without an attached message.
    pub fn classification(classification: Classification) -> Self {
        Self::Classification(ClassificationEvent {
            classification,
            message: None,
        })
    }

    /// Creates a timer event.
    pub fn timer(fire_time: DateTime<Utc>) -> Self {
        Self::Timer(TimerEvent { fire_time })
    }

    /// Creates a webhook event that is not scoped to a skill config name.
    pub fn webhook(path_segment: impl Into<String>, payload: Value) -> Self {
        Self::WebhookCall(WebhookEvent {
            skill_name: None,
            path_segment: path_segment.into(),
            payload,
        })
    }

    /// Returns the event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Classification(_) => EventKind::Classification,
            Self::Timer(_) => EventKind::Timer,
            Self::WebhookCall(_) => EventKind::WebhookCall,
        }
    }

    /// Whether this event uses "best-of" selection.
    pub fn is_conversational(&self) -> bool {
        self.kind().is_conversational()
    }

    /// Returns the message text visible to regex matchers.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message(msg) => Some(&msg.text),
            Self::Classification(c) => c.message.as_ref().map(|m| m.text.as_str()),
            Self::Timer(_) | Self::WebhookCall(_) => None,
        }
    }

    /// Returns every classification carried by this event.
    pub fn classifications(&self) -> &[Classification] {
        match self {
            Self::Message(msg) => &msg.classifications,
            Self::Classification(c) => std::slice::from_ref(&c.classification),
            Self::Timer(_) | Self::WebhookCall(_) => &[],
        }
    }

    /// Returns the message, for either message or classification events.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Self::Message(msg) => Some(msg),
            Self::Classification(c) => c.message.as_ref(),
            Self::Timer(_) | Self::WebhookCall(_) => None,
        }
    }
}

impl From<MessageEvent> for Event {
    fn from(msg: MessageEvent) -> Self {
        Self::Message(msg)
    }
}

impl From<ClassificationEvent> for Event {
    fn from(event: ClassificationEvent) -> Self {
        Self::Classification(event)
    }
}

impl From<WebhookEvent> for Event {
    fn from(event: WebhookEvent) -> Self {
        Self::WebhookCall(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_names_round_trip() {
        for provider in [
            NluProvider::Dialogflow,
            NluProvider::Luis,
            NluProvider::RasaNlu,
            NluProvider::Recast,
            NluProvider::Wit,
        ] {
            assert_eq!(NluProvider::from_name(provider.name()), provider);
        }
        assert_eq!(
            NluProvider::from_name("demo"),
            NluProvider::Custom("demo".into())
        );
    }

    #[test]
    fn test_apiai_is_dialogflow() {
        assert_eq!(NluProvider::from_name("apiai"), NluProvider::Dialogflow);
        assert_eq!(NluProvider::from_name("ApiAI"), NluProvider::Dialogflow);
    }

    #[test]
    fn test_classification_event_exposes_message_text() {
        let event = Event::Classification(ClassificationEvent {
            classification: Classification::intent("demo", "greet", 0.9),
            message: Some(MessageEvent::new("hi there")),
        });
        assert_eq!(event.text(), Some("hi there"));
        assert_eq!(event.classifications().len(), 1);
        assert!(event.is_conversational());
    }

    #[test]
    fn test_timer_and_webhook_are_not_conversational() {
        assert!(!Event::timer(Utc::now()).is_conversational());
        let hook = Event::webhook("ping", json!({}));
        assert!(!hook.is_conversational());
        assert_eq!(hook.text(), None);
        assert!(hook.classifications().is_empty());
    }

    #[test]
    fn test_event_deserializes_from_tagged_json() {
        let event: Event = serde_json::from_value(json!({
            "type": "message",
            "text": "hello",
            "connector": "shell",
        }))
        .unwrap();
        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.text(), Some("hello"));
    }
}
