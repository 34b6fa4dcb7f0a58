//! Supervised handler execution.
//!
//! The supervisor is the only place where handler code runs. It wraps the
//! skill's handler service in a [`tower::timeout::Timeout`], converts every
//! error, panic and elapsed budget into an [`Outcome`], and records the
//! outcome on the [`StatsSink`]. Nothing a handler does propagates past it.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tower::ServiceExt;
use tower::timeout::Timeout;
use tower::timeout::error::Elapsed;
use tracing::{Instrument, debug, error, info_span, warn};

use sprocket_core::{Event, MatchResult};

use crate::context::SkillContext;
use crate::error::{HandlerError, TimeoutError};
use crate::handler::HandlerResult;
use crate::skill::Skill;
use crate::stats::{DispatchKind, StatsSink};

/// How a supervised invocation ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The handler completed normally.
    Success,
    /// The handler failed; the error names the skill.
    Failed(HandlerError),
    /// The handler exceeded its budget and was cancelled.
    TimedOut(TimeoutError),
}

impl Outcome {
    /// Whether the handler completed normally.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short outcome label used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "called",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// Runs handlers with a time budget and failure isolation.
#[derive(Clone)]
pub struct ExecutionSupervisor {
    default_timeout: Duration,
    stats: Arc<dyn StatsSink>,
}

impl ExecutionSupervisor {
    /// Budget used when a skill does not set `timeout_ms`.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a supervisor reporting to `stats`.
    pub fn new(stats: Arc<dyn StatsSink>) -> Self {
        Self {
            default_timeout: Self::DEFAULT_TIMEOUT,
            stats,
        }
    }

    /// Sets the budget used when a skill does not set its own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The global handler budget.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The counters sink.
    pub fn stats(&self) -> &Arc<dyn StatsSink> {
        &self.stats
    }

    /// The budget that applies to `skill`.
    pub fn budget_for(&self, skill: &Skill) -> Duration {
        skill.config().timeout().unwrap_or(self.default_timeout)
    }

    /// Runs `skill`'s handler for `event`.
    pub async fn invoke(&self, skill: &Skill, result: MatchResult, event: Arc<Event>) -> Outcome {
        let kind = DispatchKind::of(event.kind());
        let budget = self.budget_for(skill);
        let span = info_span!(
            "skill",
            id = %skill.id(),
            name = %skill.name(),
            matcher = skill.matcher().kind_name(),
            score = result.score,
        );

        let ctx = Arc::new(SkillContext::new(
            skill.id(),
            event,
            result,
            Arc::clone(skill.config()),
        ));
        let service = Timeout::new(skill.handler().clone(), budget);
        // Erased so the callers' futures remain `Send`.
        let call: BoxFuture<'static, HandlerResult> = Box::pin(service.oneshot(ctx));

        let outcome = match call.instrument(span.clone()).await {
            Ok(()) => Outcome::Success,
            Err(e) if e.is::<Elapsed>() => Outcome::TimedOut(TimeoutError::new(skill, budget)),
            Err(e) => Outcome::Failed(HandlerError::new(skill, e)),
        };

        span.in_scope(|| match &outcome {
            Outcome::Success => {
                debug!("Skill handler completed");
                self.stats.increment(kind.called());
            }
            Outcome::Failed(e) => {
                error!(error = %e.cause, "Skill handler failed");
                self.stats.increment(kind.failed());
            }
            Outcome::TimedOut(e) => {
                warn!(budget = ?e.budget, "Skill handler timed out");
                self.stats.increment(kind.timed_out());
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Handler, into_handler};
    use crate::registry::SkillRegistry;
    use crate::stats::InMemoryStats;
    use sprocket_core::{MatcherSpec, SkillConfig};

    fn setup<H, T>(
        config: SkillConfig,
        handler: H,
    ) -> (Arc<Skill>, Arc<InMemoryStats>, ExecutionSupervisor)
    where
        H: Handler<T>,
        T: 'static,
    {
        let registry = SkillRegistry::new();
        registry.register(
            MatcherSpec::regex("x").compile().unwrap(),
            into_handler(handler),
            Arc::new(config),
        );
        let skill = Arc::clone(registry.all().iter().next().unwrap());
        let stats = Arc::new(InMemoryStats::new());
        let supervisor = ExecutionSupervisor::new(stats.clone());
        (skill, stats, supervisor)
    }

    fn message() -> Arc<Event> {
        Arc::new(Event::message("x"))
    }

    #[tokio::test]
    async fn test_success_is_counted() {
        let (skill, stats, supervisor) = setup(SkillConfig::new("ok"), || async {});
        let outcome = supervisor
            .invoke(&skill, MatchResult::new(0.6), message())
            .await;
        assert!(outcome.is_success());
        assert_eq!(stats.get("skills_called"), 1);
    }

    #[tokio::test]
    async fn test_failure_is_captured() {
        async fn fails() -> Result<(), std::io::Error> {
            Err(std::io::Error::other("disk on fire"))
        }

        let (skill, stats, supervisor) = setup(SkillConfig::new("bad"), fails);
        let outcome = supervisor
            .invoke(&skill, MatchResult::new(0.6), message())
            .await;
        match outcome {
            Outcome::Failed(e) => {
                assert_eq!(e.skill_name, "bad");
                assert_eq!(e.skill, skill.id());
                assert!(e.cause.contains("disk on fire"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(stats.get("skills_failed"), 1);
        assert_eq!(stats.get("skills_called"), 0);
    }

    #[tokio::test]
    async fn test_panic_is_a_failure() {
        async fn boom() {
            panic!("boom");
        }

        let (skill, stats, supervisor) = setup(SkillConfig::new("panicky"), boom);
        let outcome = supervisor
            .invoke(&skill, MatchResult::new(0.6), message())
            .await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(stats.get("skills_failed"), 1);
    }

    #[tokio::test]
    async fn test_per_skill_timeout() {
        async fn slow() {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        let config = SkillConfig::new("slow").with_option("timeout_ms", 20);
        let (skill, stats, supervisor) = setup(config, slow);
        assert_eq!(supervisor.budget_for(&skill), Duration::from_millis(20));

        let outcome = supervisor
            .invoke(&skill, MatchResult::new(0.6), message())
            .await;
        match outcome {
            Outcome::TimedOut(e) => assert_eq!(e.budget, Duration::from_millis(20)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(stats.get("skills_timed_out"), 1);
        assert_eq!(stats.get("skills_failed"), 0);
    }

    #[tokio::test]
    async fn test_default_timeout() {
        async fn slow() {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        let (skill, _stats, supervisor) = setup(SkillConfig::new("slow"), slow);
        let supervisor = supervisor.with_default_timeout(Duration::from_millis(10));
        let outcome = supervisor
            .invoke(&skill, MatchResult::new(0.6), message())
            .await;
        assert_eq!(outcome.as_str(), "timed_out");
    }
}
