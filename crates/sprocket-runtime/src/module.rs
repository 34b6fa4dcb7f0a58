//! Skill modules and the loader that turns configuration into a skill set.
//!
//! A [`SkillModule`] is the unit of code a `[[skills]]` entry refers to. On
//! every load the [`SkillLoader`] walks the configured skills in order, lets
//! the matching module register its handlers under that configuration, and
//! publishes the result with
//! [`SkillRegistry::clear_and_rebuild`].
//!
//! ```rust,ignore
//! let loader = SkillLoader::new();
//! loader.add(skill_module("hello", |r| {
//!     r.regex(r"^hello$", greet);
//! }));
//! let report = loader.load(&registry, &config.skills);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use sprocket_core::SkillConfig;
use sprocket_framework::{Registrar, SkillRegistry};

/// Code that registers the skills of one configuration entry.
pub trait SkillModule: Send + Sync {
    /// The name `[[skills]]` entries refer to via `name` or `module`.
    fn name(&self) -> &str;

    /// Registers this module's skills. The registrar already carries the
    /// configuration entry being loaded.
    fn register(&self, registrar: &mut Registrar);
}

/// A [`SkillModule`] backed by a closure.
pub struct FnModule<F> {
    name: String,
    register: F,
}

impl<F> SkillModule for FnModule<F>
where
    F: Fn(&mut Registrar) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, registrar: &mut Registrar) {
        (self.register)(registrar)
    }
}

/// Creates a module named `name` that registers skills with `register`.
pub fn skill_module<F>(name: impl Into<String>, register: F) -> FnModule<F>
where
    F: Fn(&mut Registrar) + Send + Sync,
{
    FnModule {
        name: name.into(),
        register,
    }
}

/// Summary of one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Generation of the published skill set.
    pub generation: u64,
    /// Configuration entries whose module was found.
    pub loaded: Vec<String>,
    /// Configuration entries whose module is unknown.
    pub missing: Vec<String>,
    /// Skills registered.
    pub registered: usize,
    /// Registrations skipped as invalid.
    pub rejected: usize,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation {}: {} skills from {} modules ({} missing, {} rejected)",
            self.generation,
            self.registered,
            self.loaded.len(),
            self.missing.len(),
            self.rejected
        )
    }
}

/// Known skill modules, by name.
#[derive(Default)]
pub struct SkillLoader {
    modules: RwLock<HashMap<String, Arc<dyn SkillModule>>>,
}

impl SkillLoader {
    /// Creates a loader with no modules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module, replacing any module with the same name.
    pub fn add(&self, module: impl SkillModule + 'static) {
        self.add_arc(Arc::new(module));
    }

    /// Adds a shared module, replacing any module with the same name.
    pub fn add_arc(&self, module: Arc<dyn SkillModule>) {
        let name = module.name().to_string();
        if self.modules.write().insert(name.clone(), module).is_some() {
            warn!(module = %name, "Replacing previously added skill module");
        } else {
            debug!(module = %name, "Skill module added");
        }
    }

    /// Whether a module called `name` is known.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    /// Names of the known modules, sorted.
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds a new skill set from `skills` and publishes it on `registry`.
    ///
    /// Entries are processed in order, so skills of earlier entries get
    /// lower ids. Entries naming an unknown module are skipped.
    pub fn load(&self, registry: &SkillRegistry, skills: &[SkillConfig]) -> LoadReport {
        let modules = self.modules.read().clone();
        let mut registrar = Registrar::new(registry.builder(), SkillConfig::default());
        let mut report = LoadReport::default();

        for config in skills {
            let module_name = config.module_name();
            let Some(module) = modules.get(module_name) else {
                warn!(
                    skill = %config.name,
                    module = %module_name,
                    "No skill module with this name, skipping"
                );
                report.missing.push(config.name.clone());
                continue;
            };

            registrar.set_config(config.clone());
            let before = registrar.registered();
            module.register(&mut registrar);
            debug!(
                skill = %config.name,
                module = %module_name,
                registered = registrar.registered() - before,
                "Skill module loaded"
            );
            report.loaded.push(config.name.clone());
        }

        report.registered = registrar.registered();
        report.rejected = registrar.rejected();
        report.generation = registry.clear_and_rebuild(registrar.finish());
        info!(%report, "Skills loaded");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprocket_core::Event;
    use sprocket_framework::{Dispatcher, ExecutionSupervisor, InMemoryStats, Options};

    async fn noop() {}

    fn loader() -> SkillLoader {
        let loader = SkillLoader::new();
        loader.add(skill_module("hello", |r| {
            r.regex("^hello$", noop);
        }));
        loader.add(skill_module("ops", |r| {
            r.crontab("* * * * *", noop);
            r.webhook("ping", noop);
            r.regex("(", noop);
        }));
        loader
    }

    #[test]
    fn test_load_in_config_order() {
        let registry = SkillRegistry::new();
        let report = loader().load(
            &registry,
            &[
                SkillConfig::new("ops"),
                SkillConfig::new("nope"),
                SkillConfig::new("hi").with_module("hello"),
            ],
        );

        assert_eq!(report.generation, 1);
        assert_eq!(report.loaded, ["ops", "hi"]);
        assert_eq!(report.missing, ["nope"]);
        assert_eq!(report.registered, 3);
        assert_eq!(report.rejected, 1);

        let names: Vec<_> = registry.all().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, ["ops", "ops", "hi"]);
    }

    #[test]
    fn test_reload_replaces_the_set() {
        let registry = SkillRegistry::new();
        let loader = loader();
        loader.load(&registry, &[SkillConfig::new("ops")]);
        let report = loader.load(&registry, &[SkillConfig::new("hello")]);

        assert_eq!(report.generation, 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.all().webhook_routes().is_empty());
    }

    #[test]
    fn test_module_names() {
        let loader = loader();
        assert!(loader.contains("ops"));
        assert_eq!(loader.module_names(), ["hello", "ops"]);
    }

    #[tokio::test]
    async fn test_handler_sees_its_own_config() {
        #[derive(serde::Deserialize)]
        struct Greeting {
            greeting: String,
        }

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let loader = SkillLoader::new();
        let sink = Arc::clone(&seen);
        loader.add(skill_module("greeter", move |r| {
            let sink = Arc::clone(&sink);
            r.regex("^hi$", move |Options(g): Options<Greeting>| {
                let sink = Arc::clone(&sink);
                async move { sink.lock().push(g.greeting) }
            });
        }));

        let registry = Arc::new(SkillRegistry::new());
        loader.load(
            &registry,
            &[SkillConfig::new("greeter").with_option("greeting", "howdy")],
        );

        let dispatcher = Dispatcher::new(
            registry,
            ExecutionSupervisor::new(Arc::new(InMemoryStats::new())),
        );
        let report = dispatcher.run(Event::message("hi")).await;
        assert!(report.all_succeeded());
        assert_eq!(*seen.lock(), ["howdy"]);
    }
}
