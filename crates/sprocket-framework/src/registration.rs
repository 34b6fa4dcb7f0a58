//! The registration API used by skill modules.
//!
//! Every registration function validates the matcher eagerly, appends the
//! skill to the set under construction, and hands the handler back unchanged
//! so a module can keep using it:
//!
//! ```rust,ignore
//! fn register(&self, r: &mut Registrar) {
//!     r.regex(r"^hello$", greet);
//!     r.dialogflow_intent("smalltalk.greetings", greet);
//!     r.crontab("*/5 * * * *", tick);
//!     r.webhook("ping", ping);
//!     r.always_with_options(AlwaysOptions { enabled: false })(fallback);
//! }
//! ```
//!
//! Invalid registrations are logged and skipped; the rest of the build
//! continues. Use [`Registrar::try_register`] to observe the error instead.

use std::sync::{Arc, Once};

use tracing::{debug, error, warn};

use sprocket_core::{ConfigurationResult, MatcherSpec, NluProvider, SkillConfig};

use crate::handler::{Handler, into_handler};
use crate::registry::SkillSetBuilder;
use crate::skill::SkillId;

static APIAI_INTENT_DEPRECATION: Once = Once::new();
static APIAI_ACTION_DEPRECATION: Once = Once::new();

/// Options of an `Always` registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlwaysOptions {
    /// A disabled skill is registered but never selected.
    pub enabled: bool,
}

impl Default for AlwaysOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Registers skills into a [`SkillSetBuilder`] on behalf of one skill
/// configuration at a time.
pub struct Registrar {
    builder: SkillSetBuilder,
    config: Arc<SkillConfig>,
    registered: usize,
    rejected: usize,
}

impl Registrar {
    /// Creates a registrar whose skills originate from `config`.
    pub fn new(builder: SkillSetBuilder, config: SkillConfig) -> Self {
        Self {
            builder,
            config: Arc::new(config),
            registered: 0,
            rejected: 0,
        }
    }

    /// Switches the configuration attached to subsequent registrations.
    pub fn set_config(&mut self, config: SkillConfig) {
        self.config = Arc::new(config);
    }

    /// The configuration attached to subsequent registrations.
    pub fn current_config(&self) -> &SkillConfig {
        &self.config
    }

    /// Validates `spec` and registers `handler` under it.
    pub fn try_register<H, T>(
        &mut self,
        spec: MatcherSpec,
        handler: H,
    ) -> ConfigurationResult<SkillId>
    where
        H: Handler<T>,
        T: 'static,
    {
        let matcher = spec.compile()?;
        debug!(
            skill = %self.config.name,
            matcher = %matcher,
            "Registering skill"
        );
        let id = self
            .builder
            .push(matcher, into_handler(handler), Arc::clone(&self.config));
        self.registered += 1;
        Ok(id)
    }

    /// Registers `handler` under `spec`, logging and skipping it when the
    /// matcher is invalid.
    pub fn register<H, T>(&mut self, spec: MatcherSpec, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        if let Err(e) = self.try_register(spec, handler.clone()) {
            error!(
                skill = %self.config.name,
                error = %e,
                "Skipping invalid skill registration"
            );
            self.rejected += 1;
        }
        handler
    }

    // ========================================================================
    // Message matchers
    // ========================================================================

    /// Case-sensitive regex on the message text, scored
    /// [`REGEX_SCORE_FACTOR`](sprocket_core::REGEX_SCORE_FACTOR).
    pub fn regex<H, T>(&mut self, pattern: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.register(MatcherSpec::regex(pattern), handler)
    }

    /// Regex with explicit case sensitivity and score factor.
    pub fn regex_with<H, T>(
        &mut self,
        pattern: &str,
        case_sensitive: bool,
        score_factor: Option<f64>,
        handler: H,
    ) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        let spec = MatcherSpec::Regex {
            pattern: pattern.to_string(),
            case_sensitive,
            score_factor,
        };
        self.register(spec, handler)
    }

    // ========================================================================
    // NLU matchers
    // ========================================================================

    /// Intent classified by any NLU provider.
    pub fn nlu_intent<H, T>(
        &mut self,
        provider: impl Into<NluProvider>,
        intent: &str,
        handler: H,
    ) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.register(MatcherSpec::nlu_intent(provider, intent), handler)
    }

    /// Action classified by any NLU provider.
    pub fn nlu_action<H, T>(
        &mut self,
        provider: impl Into<NluProvider>,
        action: &str,
        handler: H,
    ) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.register(MatcherSpec::nlu_action(provider, action), handler)
    }

    /// Dialogflow intent.
    pub fn dialogflow_intent<H, T>(&mut self, intent: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.nlu_intent(NluProvider::Dialogflow, intent, handler)
    }

    /// Dialogflow action.
    pub fn dialogflow_action<H, T>(&mut self, action: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.nlu_action(NluProvider::Dialogflow, action, handler)
    }

    /// Former name of [`dialogflow_intent`](Self::dialogflow_intent).
    #[deprecated(note = "API.AI is now Dialogflow, use `dialogflow_intent`")]
    pub fn apiai_intent<H, T>(&mut self, intent: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        APIAI_INTENT_DEPRECATION.call_once(|| {
            warn!("`apiai_intent` is deprecated, use `dialogflow_intent` instead");
        });
        self.dialogflow_intent(intent, handler)
    }

    /// Former name of [`dialogflow_action`](Self::dialogflow_action).
    #[deprecated(note = "API.AI is now Dialogflow, use `dialogflow_action`")]
    pub fn apiai_action<H, T>(&mut self, action: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        APIAI_ACTION_DEPRECATION.call_once(|| {
            warn!("`apiai_action` is deprecated, use `dialogflow_action` instead");
        });
        self.dialogflow_action(action, handler)
    }

    /// LUIS intent.
    pub fn luisai_intent<H, T>(&mut self, intent: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.nlu_intent(NluProvider::Luis, intent, handler)
    }

    /// Rasa NLU intent.
    pub fn rasanlu_intent<H, T>(&mut self, intent: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.nlu_intent(NluProvider::RasaNlu, intent, handler)
    }

    /// Recast.AI intent.
    pub fn recastai_intent<H, T>(&mut self, intent: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.nlu_intent(NluProvider::Recast, intent, handler)
    }

    /// Wit.ai intent.
    pub fn witai_intent<H, T>(&mut self, intent: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.nlu_intent(NluProvider::Wit, intent, handler)
    }

    // ========================================================================
    // Timer, webhook and fallback matchers
    // ========================================================================

    /// Cron schedule evaluated in UTC.
    pub fn crontab<H, T>(&mut self, schedule: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.register(MatcherSpec::crontab(schedule), handler)
    }

    /// Cron schedule evaluated in the IANA `timezone`.
    pub fn crontab_in<H, T>(&mut self, schedule: &str, timezone: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        let spec = MatcherSpec::Crontab {
            schedule: schedule.to_string(),
            timezone: Some(timezone.to_string()),
        };
        self.register(spec, handler)
    }

    /// Webhook served at `/skill/{config name}/{path_segment}`.
    pub fn webhook<H, T>(&mut self, path_segment: &str, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.register(MatcherSpec::webhook(path_segment), handler)
    }

    /// Last-resort skill for conversational events nothing else matched.
    pub fn always<H, T>(&mut self, handler: H) -> H
    where
        H: Handler<T>,
        T: 'static,
    {
        self.register(MatcherSpec::always(), handler)
    }

    /// Returns a registration function for an `Always` skill with `options`.
    pub fn always_with_options<H, T>(
        &mut self,
        options: AlwaysOptions,
    ) -> impl FnOnce(H) -> H + '_
    where
        H: Handler<T>,
        T: 'static,
    {
        move |handler| {
            self.register(
                MatcherSpec::Always {
                    enabled: options.enabled,
                },
                handler,
            )
        }
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Number of skills registered so far.
    pub fn registered(&self) -> usize {
        self.registered
    }

    /// Number of registrations rejected as invalid.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Returns the collected skills, ready for
    /// [`SkillRegistry::clear_and_rebuild`](crate::registry::SkillRegistry::clear_and_rebuild).
    pub fn finish(self) -> SkillSetBuilder {
        self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SkillRegistry;
    use sprocket_core::{ConfigurationError, Matcher};

    async fn noop() {}

    fn registrar(registry: &SkillRegistry) -> Registrar {
        Registrar::new(registry.builder(), SkillConfig::new("demo"))
    }

    #[test]
    fn test_registration_returns_handler_and_appends() {
        let registry = SkillRegistry::new();
        let mut r = registrar(&registry);

        let returned = r.regex("^hi$", noop);
        r.dialogflow_intent("greet", returned);
        r.crontab("*/5 * * * *", noop);
        r.webhook("ping", noop);
        r.always(noop);
        assert_eq!(r.registered(), 5);
        assert_eq!(r.rejected(), 0);

        registry.clear_and_rebuild(r.finish());
        let kinds: Vec<_> = registry
            .all()
            .iter()
            .map(|s| s.matcher().kind_name())
            .collect();
        assert_eq!(kinds, ["regex", "nlu_intent", "crontab", "webhook", "always"]);
    }

    #[test]
    fn test_invalid_registration_is_skipped() {
        let registry = SkillRegistry::new();
        let mut r = registrar(&registry);

        r.regex("(unclosed", noop);
        r.crontab("not a schedule", noop);
        r.crontab_in("0 9 * * *", "Mars/Olympus_Mons", noop);
        r.regex("^ok$", noop);
        assert_eq!(r.rejected(), 3);
        assert_eq!(r.registered(), 1);

        let err = r.try_register(MatcherSpec::webhook(""), noop).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingField(_)));
    }

    #[test]
    fn test_provider_helpers() {
        let registry = SkillRegistry::new();
        let mut r = registrar(&registry);
        r.luisai_intent("a", noop);
        r.rasanlu_intent("b", noop);
        r.recastai_intent("c", noop);
        r.witai_intent("d", noop);
        r.dialogflow_action("e", noop);
        #[allow(deprecated)]
        {
            r.apiai_intent("f", noop);
            r.apiai_action("g", noop);
            r.apiai_intent("h", noop);
        }
        registry.clear_and_rebuild(r.finish());

        let providers: Vec<_> = registry
            .all()
            .iter()
            .map(|s| match s.matcher() {
                Matcher::NluIntent { provider, .. } | Matcher::NluAction { provider, .. } => {
                    provider.clone()
                }
                other => panic!("unexpected matcher {other}"),
            })
            .collect();
        assert_eq!(
            providers,
            vec![
                NluProvider::Luis,
                NluProvider::RasaNlu,
                NluProvider::Recast,
                NluProvider::Wit,
                NluProvider::Dialogflow,
                NluProvider::Dialogflow,
                NluProvider::Dialogflow,
                NluProvider::Dialogflow,
            ]
        );
    }

    #[test]
    fn test_always_with_options_and_config_switch() {
        let registry = SkillRegistry::new();
        let mut r = registrar(&registry);
        r.always_with_options(AlwaysOptions { enabled: false })(noop);
        r.set_config(SkillConfig::new("other"));
        r.always_with_options(AlwaysOptions::default())(noop);
        registry.clear_and_rebuild(r.finish());

        let skills: Vec<_> = registry
            .all()
            .iter()
            .map(|s| (s.name().to_string(), s.matcher().clone()))
            .collect();
        assert!(matches!(&skills[0], (name, Matcher::Always { enabled: false }) if name == "demo"));
        assert!(matches!(&skills[1], (name, Matcher::Always { enabled: true }) if name == "other"));
    }
}
