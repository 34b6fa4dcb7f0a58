//! Origin configuration attached to every registered skill.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The configuration section a skill was loaded from.
///
/// ```yaml
/// skills:
///   - name: demo
///     module: greeter
///     greeting: "Howdy"
///     timeout_ms: 5000
/// ```
///
/// Everything besides `name` and `module` ends up in [`options`](Self::options).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Config name; also the `{name}` part of webhook URLs.
    pub name: String,
    /// Module that registers the skill's handlers, when different from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Free-form options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl SkillConfig {
    /// Creates a config with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            options: Map::new(),
        }
    }

    /// Sets the module path.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// The module to load: `module` if set, otherwise `name`.
    pub fn module_name(&self) -> &str {
        self.module.as_deref().unwrap_or(&self.name)
    }

    /// Returns a raw option.
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Deserializes an option, returning `None` if absent or of the wrong shape.
    pub fn option_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.options
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Per-skill handler budget from the `timeout_ms` option.
    pub fn timeout(&self) -> Option<Duration> {
        self.option_as::<u64>("timeout_ms")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
