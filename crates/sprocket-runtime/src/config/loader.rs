//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `sprocket.toml`, `config.toml`
//! - `yaml-config`: `sprocket.yaml`, `sprocket.yml`, `config.yaml`, `config.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic [`merge`](ConfigLoader::merge) values
//! 3. Profile-specific config file (`sprocket.{profile}.toml`)
//! 4. Main config file (`sprocket.toml`)
//! 5. Environment variables (`SPROCKET_*`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `SPROCKET_` prefix with `__` as the nesting separator:
//!
//! - `SPROCKET_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `SPROCKET_DISPATCH__HANDLER_TIMEOUT_MS=5000` → `dispatch.handler_timeout_ms = 5000`
//! - `SPROCKET_WEB__PORT=9000` → `web.port = 9000`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./deploy/sprocket.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SprocketConfig;
use super::validation::validate_config;

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `SPROCKET_PROFILE`, defaulting to `Development`.
    pub fn from_env() -> Self {
        std::env::var("SPROCKET_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-source configuration loader.
///
/// The loader is `Clone` so the runtime can keep it and load again on reload.
#[derive(Clone)]
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the default locations and reads the
    /// environment.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/sprocket` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("sprocket")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a programmatic configuration over the built-in defaults.
    pub fn merge(mut self, config: SprocketConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads the configuration without validating it.
    pub fn load(&self) -> ConfigResult<SprocketConfig> {
        let figment = self.build_figment()?;
        let config: SprocketConfig = figment.extract()?;

        debug!(
            profile = %self.profile,
            logging_level = %config.logging.level,
            skills = config.skills.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates the configuration.
    pub fn load_validated(&self) -> ConfigResult<SprocketConfig> {
        let config = self.load()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn build_figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SprocketConfig::default()))
            .merge(self.figment.clone());

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with SPROCKET_ prefix");
            figment = figment.merge(
                Env::prefixed("SPROCKET_")
                    .ignore(&["PROFILE"])
                    .split("__")
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment)
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sprocket"));
        }
        paths
    }

    /// Tries `search_paths × base_names`; a profile-specific file is merged
    /// before its base file, and the first base file found ends the search.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = search_path.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["sprocket.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["sprocket.yaml", "sprocket.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads and validates the configuration from the default locations.
pub fn load_config() -> ConfigResult<SprocketConfig> {
    ConfigLoader::new().load_validated()
}

/// Loads and validates the configuration from `path`, with environment
/// overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<SprocketConfig> {
    ConfigLoader::new().file(path).load_validated()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use sprocket_framework::FanOutMode;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sprocket-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let dir = temp_dir("empty");
        let config = ConfigLoader::new()
            .search_path(&dir)
            .without_env()
            .load()
            .unwrap();
        assert_eq!(config.logging.level.as_str(), "info");
        assert!(config.skills.is_empty());
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/nonexistent/sprocket.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = temp_dir("ext");
        let path = dir.join("sprocket.ini");
        std::fs::write(&path, "").unwrap();
        let err = ConfigLoader::new().file(&path).without_env().load().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_search_path_with_profile() {
        let dir = temp_dir("profile");
        std::fs::write(
            dir.join("sprocket.toml"),
            r#"
[logging]
level = "debug"

[[skills]]
name = "hello"
greeting = "howdy"
timeout_ms = 500
"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("sprocket.production.toml"),
            "[dispatch]\nfan_out = \"concurrent\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("production")
            .search_path(&dir)
            .without_env()
            .load_validated()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.dispatch.fan_out, FanOutMode::Concurrent);
        assert_eq!(config.skills.len(), 1);
        assert_eq!(config.skills[0].name, "hello");
        assert_eq!(
            config.skills[0].option_as::<String>("greeting").as_deref(),
            Some("howdy")
        );
        assert_eq!(
            config.skills[0].timeout(),
            Some(std::time::Duration::from_millis(500))
        );
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_overrides_merged_defaults() {
        let dir = temp_dir("merge");
        let path = dir.join("custom.toml");
        std::fs::write(&path, "[web]\nport = 9100\n").unwrap();

        let mut base = SprocketConfig::default();
        base.web.port = 7000;
        base.web.enabled = false;

        let config = ConfigLoader::new()
            .merge(base)
            .file(&path)
            .without_env()
            .load()
            .unwrap();
        assert_eq!(config.web.port, 9100);
        assert!(!config.web.enabled);
    }
}
