//! The read-only context handed to a running handler.

use std::sync::Arc;

use sprocket_core::{Event, MatchResult, SkillConfig};

use crate::skill::SkillId;

/// Everything a handler can see about the invocation that triggered it.
///
/// One `SkillContext` is built per invocation by the
/// [`ExecutionSupervisor`](crate::supervisor::ExecutionSupervisor). The event
/// is shared between the skills of one dispatch; the match result is a copy
/// owned by this invocation. Nothing in here can reach back into the
/// registry.
#[derive(Debug)]
pub struct SkillContext {
    skill: SkillId,
    event: Arc<Event>,
    result: MatchResult,
    config: Arc<SkillConfig>,
}

impl SkillContext {
    /// Creates a context.
    pub fn new(
        skill: SkillId,
        event: Arc<Event>,
        result: MatchResult,
        config: Arc<SkillConfig>,
    ) -> Self {
        Self {
            skill,
            event,
            result,
            config,
        }
    }

    /// Id of the invoked skill.
    pub fn skill(&self) -> SkillId {
        self.skill
    }

    /// The dispatched event.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Shared handle to the dispatched event.
    pub fn event_arc(&self) -> Arc<Event> {
        Arc::clone(&self.event)
    }

    /// The match that selected this skill.
    pub fn result(&self) -> &MatchResult {
        &self.result
    }

    /// The skill's origin configuration.
    pub fn config(&self) -> &Arc<SkillConfig> {
        &self.config
    }
}
