//! Registered skills.

use std::fmt;
use std::sync::Arc;

use sprocket_core::{Matcher, SkillConfig};

use crate::handler::BoxedHandler;

/// Registration sequence number of a skill.
///
/// Ids are handed out by the [`SkillRegistry`](crate::registry::SkillRegistry)
/// in registration order and are never reused, so they double as the
/// deterministic tie-break between equally scored matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkillId(pub(crate) u64);

impl SkillId {
    /// The raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A (matcher, handler, origin config) triple.
///
/// Immutable once built; a skill only disappears when the whole registry is
/// rebuilt.
pub struct Skill {
    id: SkillId,
    matcher: Matcher,
    handler: BoxedHandler,
    config: Arc<SkillConfig>,
}

impl Skill {
    pub(crate) fn new(
        id: SkillId,
        matcher: Matcher,
        handler: BoxedHandler,
        config: Arc<SkillConfig>,
    ) -> Self {
        Self {
            id,
            matcher,
            handler,
            config,
        }
    }

    /// The registration sequence number.
    pub fn id(&self) -> SkillId {
        self.id
    }

    /// The matcher guarding this skill.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The handler service.
    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// The configuration this skill was registered from.
    pub fn config(&self) -> &Arc<SkillConfig> {
        &self.config
    }

    /// Config name of the skill.
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

impl fmt::Debug for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skill")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}
