//! The skill registry.
//!
//! Skills live in an immutable [`SkillSet`]. The registry holds the current
//! set behind an `Arc`; readers take a snapshot by cloning that `Arc` under a
//! briefly held lock, writers publish a new set with a single swap. A
//! dispatch that started on an old snapshot finishes on it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use sprocket_core::{Matcher, SkillConfig, WebhookRoute};

use crate::handler::BoxedHandler;
use crate::skill::{Skill, SkillId};

// ============================================================================
// SkillSet
// ============================================================================

/// An immutable, ordered collection of skills.
#[derive(Debug, Clone, Default)]
pub struct SkillSet {
    generation: u64,
    skills: Vec<Arc<Skill>>,
}

impl SkillSet {
    /// Generation of this set; bumped on every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Iterates the skills in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Skill>> {
        self.skills.iter()
    }

    /// Number of skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Looks up a skill by id.
    pub fn get(&self, id: SkillId) -> Option<&Arc<Skill>> {
        self.skills
            .binary_search_by_key(&id, |skill| skill.id())
            .ok()
            .map(|idx| &self.skills[idx])
    }

    /// The HTTP routes the webhook skills of this set need.
    ///
    /// One route per distinct `(config name, segment)` pair, in registration
    /// order.
    pub fn webhook_routes(&self) -> Vec<WebhookRoute> {
        let mut routes: Vec<WebhookRoute> = Vec::new();
        for skill in &self.skills {
            if let Some(segment) = skill.matcher().webhook_segment() {
                let route = WebhookRoute::new(skill.name(), segment);
                if !routes.contains(&route) {
                    routes.push(route);
                }
            }
        }
        routes
    }
}

impl<'a> IntoIterator for &'a SkillSet {
    type Item = &'a Arc<Skill>;
    type IntoIter = std::slice::Iter<'a, Arc<Skill>>;

    fn into_iter(self) -> Self::IntoIter {
        self.skills.iter()
    }
}

// ============================================================================
// SkillSetBuilder
// ============================================================================

/// Collects skills off to the side before they are published.
///
/// Obtained from [`SkillRegistry::builder`], so the ids it hands out never
/// collide with those of skills registered directly.
pub struct SkillSetBuilder {
    ids: Arc<AtomicU64>,
    skills: Vec<Arc<Skill>>,
}

impl SkillSetBuilder {
    /// Appends a skill and returns its id.
    pub fn push(
        &mut self,
        matcher: Matcher,
        handler: BoxedHandler,
        config: Arc<SkillConfig>,
    ) -> SkillId {
        let id = SkillId(self.ids.fetch_add(1, Ordering::Relaxed));
        self.skills
            .push(Arc::new(Skill::new(id, matcher, handler, config)));
        id
    }

    /// Number of collected skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether nothing has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

// ============================================================================
// SkillRegistry
// ============================================================================

/// Owner of the current [`SkillSet`].
pub struct SkillRegistry {
    current: RwLock<Arc<SkillSet>>,
    ids: Arc<AtomicU64>,
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(SkillSet::default())),
            ids: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Appends a single skill to the current set.
    ///
    /// Snapshots taken before the call do not see the new skill.
    pub fn register(
        &self,
        matcher: Matcher,
        handler: BoxedHandler,
        config: Arc<SkillConfig>,
    ) -> SkillId {
        let mut current = self.current.write();
        // Allocated under the write lock so ids stay in append order.
        let id = SkillId(self.ids.fetch_add(1, Ordering::Relaxed));
        debug!(skill = %id, name = %config.name, matcher = %matcher, "Registering skill");
        let skill = Arc::new(Skill::new(id, matcher, handler, config));
        Arc::make_mut(&mut current).skills.push(skill);
        id
    }

    /// A snapshot of the current set, in registration order.
    pub fn all(&self) -> Arc<SkillSet> {
        Arc::clone(&self.current.read())
    }

    /// Starts building a replacement set.
    pub fn builder(&self) -> SkillSetBuilder {
        SkillSetBuilder {
            ids: Arc::clone(&self.ids),
            skills: Vec::new(),
        }
    }

    /// Replaces the current set with the one collected by `builder`.
    ///
    /// The new set becomes visible to later snapshots in one swap; it is
    /// never observable half-built. Returns the new generation.
    pub fn clear_and_rebuild(&self, builder: SkillSetBuilder) -> u64 {
        let mut skills = builder.skills;
        skills.sort_by_key(|skill| skill.id());

        let mut current = self.current.write();
        let generation = current.generation + 1;
        let count = skills.len();
        *current = Arc::new(SkillSet { generation, skills });
        drop(current);

        info!(generation, skills = count, "Skill set published");
        generation
    }

    /// Number of skills in the current set.
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// Whether the current set is empty.
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::into_handler;
    use sprocket_core::MatcherSpec;

    fn add(registry: &SkillRegistry, spec: MatcherSpec, name: &str) -> SkillId {
        registry.register(
            spec.compile().unwrap(),
            into_handler(|| async {}),
            Arc::new(SkillConfig::new(name)),
        )
    }

    fn push(builder: &mut SkillSetBuilder, spec: MatcherSpec, name: &str) -> SkillId {
        builder.push(
            spec.compile().unwrap(),
            into_handler(|| async {}),
            Arc::new(SkillConfig::new(name)),
        )
    }

    #[test]
    fn test_register_preserves_order() {
        let registry = SkillRegistry::new();
        let a = add(&registry, MatcherSpec::regex("a"), "x");
        let b = add(&registry, MatcherSpec::regex("b"), "x");
        assert!(a < b);

        let all = registry.all();
        let ids: Vec<_> = all.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(all.get(b).unwrap().id(), b);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_registration() {
        let registry = SkillRegistry::new();
        add(&registry, MatcherSpec::always(), "x");
        let before = registry.all();

        add(&registry, MatcherSpec::regex("a"), "x");
        assert_eq!(before.len(), 1);
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_clear_and_rebuild_swaps_atomically() {
        let registry = SkillRegistry::new();
        let old_id = add(&registry, MatcherSpec::regex("old"), "x");
        let old = registry.all();

        let mut builder = registry.builder();
        push(&mut builder, MatcherSpec::regex("one"), "y");
        push(&mut builder, MatcherSpec::regex("two"), "y");
        assert_eq!(registry.len(), 1);

        let generation = registry.clear_and_rebuild(builder);
        assert_eq!(generation, old.generation() + 1);
        assert_eq!(old.len(), 1);

        let new = registry.all();
        assert_eq!(new.len(), 2);
        assert!(new.iter().all(|s| s.name() == "y"));
        assert!(new.iter().all(|s| s.id() > old_id));
        assert!(new.get(old_id).is_none());
    }

    #[test]
    fn test_webhook_routes() {
        let registry = SkillRegistry::new();
        add(&registry, MatcherSpec::webhook("ping"), "demo");
        add(&registry, MatcherSpec::webhook("ping"), "demo");
        add(&registry, MatcherSpec::webhook("pong"), "other");
        add(&registry, MatcherSpec::regex("x"), "demo");

        assert_eq!(
            registry.all().webhook_routes(),
            vec![
                WebhookRoute::new("demo", "ping"),
                WebhookRoute::new("other", "pong"),
            ]
        );
    }
}
