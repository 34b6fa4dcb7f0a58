//! Invocation counters.
//!
//! The supervisor reports every finished invocation to a [`StatsSink`]. The
//! counter name is `<kind>_<outcome>`, e.g. `webhooks_called` or
//! `skills_timed_out`.

use std::collections::HashMap;

use parking_lot::Mutex;

use sprocket_core::EventKind;

/// Receiver of counter increments.
pub trait StatsSink: Send + Sync {
    /// Adds one to `counter`.
    fn increment(&self, counter: &str);
}

/// Discards every increment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn increment(&self, _counter: &str) {}
}

/// Keeps counters in memory.
#[derive(Debug, Default)]
pub struct InMemoryStats {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemoryStats {
    /// Creates an empty counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `counter`; zero when never incremented.
    pub fn get(&self, counter: &str) -> u64 {
        self.counters.lock().get(counter).copied().unwrap_or(0)
    }

    /// A copy of all counters.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters.lock().clone()
    }
}

impl StatsSink for InMemoryStats {
    fn increment(&self, counter: &str) {
        *self.counters.lock().entry(counter.to_string()).or_insert(0) += 1;
    }
}

/// Which family of counters an invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// Message and classification events.
    Conversational,
    /// Timer events.
    Crontab,
    /// Webhook calls.
    Webhook,
}

impl DispatchKind {
    /// The family of `kind`.
    pub fn of(kind: EventKind) -> Self {
        match kind {
            EventKind::Message | EventKind::Classification => Self::Conversational,
            EventKind::Timer => Self::Crontab,
            EventKind::WebhookCall => Self::Webhook,
        }
    }

    /// Counter of successful invocations.
    pub fn called(self) -> &'static str {
        match self {
            Self::Conversational => "skills_called",
            Self::Crontab => "crontabs_called",
            Self::Webhook => "webhooks_called",
        }
    }

    /// Counter of failed invocations.
    pub fn failed(self) -> &'static str {
        match self {
            Self::Conversational => "skills_failed",
            Self::Crontab => "crontabs_failed",
            Self::Webhook => "webhooks_failed",
        }
    }

    /// Counter of invocations cancelled on timeout.
    pub fn timed_out(self) -> &'static str {
        match self {
            Self::Conversational => "skills_timed_out",
            Self::Crontab => "crontabs_timed_out",
            Self::Webhook => "webhooks_timed_out",
        }
    }
}
