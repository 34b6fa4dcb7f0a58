//! Event dispatch.
//!
//! The dispatcher takes one registry snapshot per event and applies one of
//! two selection policies:
//!
//! - **best-of** for conversational events (messages and classifications):
//!   the highest scoring skill wins, ties go to the earliest registration,
//!   and `Always` skills are only consulted when nothing else matched;
//! - **fan-out** for timers and webhook calls: every matching skill runs, in
//!   registration order.
//!
//! Selected skills are handed to the [`ExecutionSupervisor`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, debug, info_span, trace};

use sprocket_core::{
    Event, EventKind, MatchResult, Matcher, WebhookEndpoint, WebhookEvent, WebhookResponse,
};

use crate::registry::{SkillRegistry, SkillSet};
use crate::skill::{Skill, SkillId};
use crate::supervisor::{ExecutionSupervisor, Outcome};

// ============================================================================
// Reports
// ============================================================================

/// How fanned-out skills are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutMode {
    /// One after the other, in registration order.
    #[default]
    Sequential,
    /// All at once; started in registration order, completion order is
    /// unspecified.
    Concurrent,
}

/// A selected skill together with its match.
#[derive(Debug, Clone)]
pub struct SkillMatch {
    /// The selected skill.
    pub skill: Arc<Skill>,
    /// Its match result.
    pub result: MatchResult,
}

/// The outcome of one supervised invocation.
#[derive(Debug, Clone)]
pub struct InvocationReport {
    /// The invoked skill.
    pub skill: SkillId,
    /// Config name of the invoked skill.
    pub skill_name: String,
    /// Score the skill was selected with.
    pub score: f64,
    /// How the invocation ended.
    pub outcome: Outcome,
}

/// Everything that happened while running one event.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Kind of the dispatched event.
    pub kind: EventKind,
    /// Generation of the skill set the event was dispatched against.
    pub generation: u64,
    /// One entry per invoked skill, in selection order.
    pub invocations: Vec<InvocationReport>,
}

impl DispatchReport {
    fn empty(kind: EventKind, generation: u64) -> Self {
        Self {
            kind,
            generation,
            invocations: Vec::new(),
        }
    }

    /// Whether no skill was invoked.
    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// Whether every invoked skill completed normally.
    pub fn all_succeeded(&self) -> bool {
        self.invocations.iter().all(|i| i.outcome.is_success())
    }

    /// The HTTP answer for a webhook dispatch.
    ///
    /// `None` when no skill ran. Otherwise the first failure or timeout
    /// decides the status; if every skill succeeded the answer is the
    /// `{"called_skill": segment}` acknowledgement.
    pub fn webhook_response(&self, path_segment: &str) -> Option<WebhookResponse> {
        if self.is_empty() {
            return None;
        }
        let response = self
            .invocations
            .iter()
            .find_map(|i| match &i.outcome {
                Outcome::Success => None,
                Outcome::Failed(e) => Some(WebhookResponse::failed(path_segment, &e.cause)),
                Outcome::TimedOut(_) => Some(WebhookResponse::timed_out(path_segment)),
            })
            .unwrap_or_else(|| WebhookResponse::called(path_segment));
        Some(response)
    }
}

// ============================================================================
// Cron ledger
// ============================================================================

/// Remembers the recent ticks each crontab skill fired for.
#[derive(Debug, Default)]
struct CronLedger {
    fired: Mutex<HashMap<SkillId, BTreeSet<DateTime<Utc>>>>,
}

impl CronLedger {
    const MAX_SKILLS: usize = 1024;
    const TICKS_PER_SKILL: usize = 64;

    /// Records `tick` for `skill`; false if it already fired for that tick.
    fn claim(&self, skill: SkillId, tick: DateTime<Utc>) -> bool {
        let mut fired = self.fired.lock();
        let ticks = fired.entry(skill).or_default();
        if !ticks.insert(tick) {
            return false;
        }
        if ticks.len() > Self::TICKS_PER_SKILL {
            ticks.pop_first();
        }
        true
    }

    /// Forgets skills that are no longer registered.
    fn prune(&self, set: &SkillSet) {
        let mut fired = self.fired.lock();
        if fired.len() > Self::MAX_SKILLS {
            fired.retain(|id, _| set.get(*id).is_some());
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Selects and runs skills for incoming events.
pub struct Dispatcher {
    registry: Arc<SkillRegistry>,
    supervisor: ExecutionSupervisor,
    fan_out: FanOutMode,
    ledger: CronLedger,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: Arc<SkillRegistry>, supervisor: ExecutionSupervisor) -> Self {
        Self {
            registry,
            supervisor,
            fan_out: FanOutMode::default(),
            ledger: CronLedger::default(),
        }
    }

    /// Sets how fanned-out skills are run.
    pub fn with_fan_out(mut self, mode: FanOutMode) -> Self {
        self.fan_out = mode;
        self
    }

    /// The registry skills are selected from.
    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    /// The supervisor running the handlers.
    pub fn supervisor(&self) -> &ExecutionSupervisor {
        &self.supervisor
    }

    /// The fan-out mode.
    pub fn fan_out(&self) -> FanOutMode {
        self.fan_out
    }

    /// Selects the skills that should handle `event`, without running them.
    ///
    /// Returns an empty vector when nothing matched.
    pub fn dispatch(&self, event: &Event) -> Vec<SkillMatch> {
        select(&self.registry.all(), event)
    }

    /// Selects and runs the skills for `event`.
    pub async fn run(&self, event: Event) -> DispatchReport {
        let set = self.registry.all();
        let kind = event.kind();
        let span = info_span!("dispatch", kind = %kind, generation = set.generation());

        async move {
            let mut selected = select(&set, &event);
            if let Event::Timer(timer) = &event {
                selected.retain(|m| {
                    let tick = scheduled_tick(&m.skill, timer.fire_time);
                    self.ledger.claim(m.skill.id(), tick)
                });
                self.ledger.prune(&set);
            }

            if selected.is_empty() {
                debug!("No skill matched");
                return DispatchReport::empty(kind, set.generation());
            }
            debug!(selected = selected.len(), "Running skills");

            let event = Arc::new(event);
            let invocations = match self.fan_out {
                FanOutMode::Concurrent if selected.len() > 1 => {
                    join_all(
                        selected
                            .into_iter()
                            .map(|m| self.invoke(m, Arc::clone(&event))),
                    )
                    .await
                }
                _ => {
                    let mut invocations = Vec::with_capacity(selected.len());
                    for m in selected {
                        invocations.push(self.invoke(m, Arc::clone(&event)).await);
                    }
                    invocations
                }
            };

            DispatchReport {
                kind,
                generation: set.generation(),
                invocations,
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the webhook skills of config `skill_name` bound to
    /// `path_segment`.
    ///
    /// Returns `None` when no skill matched.
    pub async fn run_webhook(
        &self,
        skill_name: &str,
        path_segment: &str,
        payload: Value,
    ) -> Option<WebhookResponse> {
        let event = Event::WebhookCall(WebhookEvent {
            skill_name: Some(skill_name.to_string()),
            path_segment: path_segment.to_string(),
            payload,
        });
        self.run(event).await.webhook_response(path_segment)
    }

    async fn invoke(&self, selected: SkillMatch, event: Arc<Event>) -> InvocationReport {
        let SkillMatch { skill, result } = selected;
        let score = result.score;
        let outcome = self.supervisor.invoke(&skill, result, event).await;
        InvocationReport {
            skill: skill.id(),
            skill_name: skill.name().to_string(),
            score,
            outcome,
        }
    }
}

#[async_trait]
impl WebhookEndpoint for Dispatcher {
    async fn call_webhook(
        &self,
        skill_name: &str,
        path_segment: &str,
        payload: Value,
    ) -> Option<WebhookResponse> {
        self.run_webhook(skill_name, path_segment, payload).await
    }
}

// ============================================================================
// Selection
// ============================================================================

fn select(set: &SkillSet, event: &Event) -> Vec<SkillMatch> {
    let kind = event.kind();
    if kind.is_conversational() {
        select_best(set, event).into_iter().collect()
    } else {
        select_all(set, event)
    }
}

/// Best-of selection for conversational events.
fn select_best(set: &SkillSet, event: &Event) -> Option<SkillMatch> {
    let kind = event.kind();
    let mut best: Option<SkillMatch> = None;

    for skill in set.iter() {
        let matcher = skill.matcher();
        if matcher.is_fallback() || !matcher.accepts(kind) {
            continue;
        }
        let Some(result) = matcher.evaluate(event) else {
            continue;
        };
        trace!(skill = %skill.id(), score = result.score, "Skill matched");

        let better = match &best {
            None => true,
            Some(current) => {
                result.score > current.result.score
                    || (result.score == current.result.score && skill.id() < current.skill.id())
            }
        };
        if better {
            best = Some(SkillMatch {
                skill: Arc::clone(skill),
                result,
            });
        }
    }

    best.or_else(|| {
        set.iter().find_map(|skill| {
            let matcher = skill.matcher();
            if !matcher.is_fallback() {
                return None;
            }
            matcher.evaluate(event).map(|result| SkillMatch {
                skill: Arc::clone(skill),
                result,
            })
        })
    })
}

/// The ledger key for a crontab skill firing at `fire_time`.
fn scheduled_tick(skill: &Skill, fire_time: DateTime<Utc>) -> DateTime<Utc> {
    match skill.matcher() {
        Matcher::Crontab(schedule) => schedule.tick(fire_time),
        _ => None,
    }
    .unwrap_or(fire_time)
}

/// Fan-out selection for timers and webhook calls.
fn select_all(set: &SkillSet, event: &Event) -> Vec<SkillMatch> {
    let kind = event.kind();
    let addressed = match event {
        Event::WebhookCall(hook) => hook.skill_name.as_deref(),
        _ => None,
    };

    set.iter()
        .filter(|skill| skill.matcher().accepts(kind))
        .filter(|skill| addressed.is_none_or(|name| skill.name() == name))
        .filter_map(|skill| {
            skill.matcher().evaluate(event).map(|result| SkillMatch {
                skill: Arc::clone(skill),
                result,
            })
        })
        .collect()
}
