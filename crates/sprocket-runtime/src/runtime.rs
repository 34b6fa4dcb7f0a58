//! Runtime orchestration: configuration, skill loading, webhook serving and
//! the cron ticker.
//!
//! ```rust,ignore
//! use sprocket_runtime::SprocketRuntime;
//!
//! let runtime = SprocketRuntime::builder()
//!     .config_file("sprocket.toml")
//!     .module(skill_module("hello", |r| { r.regex(r"^hello$", greet); }))
//!     .build()?;
//! runtime.run().await?;
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sprocket_core::{Event, WebhookBinder};
use sprocket_framework::{
    DispatchReport, Dispatcher, ExecutionSupervisor, InMemoryStats, SkillRegistry,
};
#[cfg(feature = "http-server")]
use sprocket_transport::WebhookServer;
use sprocket_transport::ListenerHandle;

use crate::config::{ConfigLoader, SprocketConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::module::{LoadReport, SkillLoader, SkillModule};
use crate::ticker::CronTicker;

/// Background work owned while the runtime is started.
#[derive(Default)]
struct Running {
    listener: Option<ListenerHandle>,
    ticker: Option<JoinHandle<()>>,
}

/// The Sprocket runtime.
///
/// Owns the skill registry, the dispatcher and its counters, and the known
/// skill modules. Dispatch settings are fixed at construction; a
/// [`reload`](Self::reload) only rebuilds the skill set.
pub struct SprocketRuntime {
    config: RwLock<SprocketConfig>,
    config_loader: Option<ConfigLoader>,
    registry: Arc<SkillRegistry>,
    stats: Arc<InMemoryStats>,
    dispatcher: Arc<Dispatcher>,
    modules: SkillLoader,
    binders: RwLock<Vec<Arc<dyn WebhookBinder>>>,
    #[cfg(feature = "http-server")]
    webhook_server: Arc<WebhookServer>,
    running: Mutex<Option<Running>>,
}

impl SprocketRuntime {
    /// Creates a runtime from the configuration found in the current
    /// directory, falling back to defaults.
    pub fn new() -> Self {
        let loader = ConfigLoader::new().with_current_dir();
        let config = loader.load_validated().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config ({e}), using defaults");
            SprocketConfig::default()
        });
        Self::with_loader(config, Some(loader))
    }

    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Initializes logging unless a subscriber is already installed.
    pub fn from_config(config: SprocketConfig) -> Self {
        Self::with_loader(config, None)
    }

    fn with_loader(config: SprocketConfig, config_loader: Option<ConfigLoader>) -> Self {
        logging::init_from_config(&config.logging);

        let registry = Arc::new(SkillRegistry::new());
        let stats = Arc::new(InMemoryStats::new());
        let supervisor = ExecutionSupervisor::new(stats.clone())
            .with_default_timeout(config.dispatch.handler_timeout());
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&registry), supervisor)
                .with_fan_out(config.dispatch.fan_out),
        );

        #[cfg(feature = "http-server")]
        let webhook_server = WebhookServer::new(dispatcher.clone());
        #[allow(unused_mut)]
        let mut binders: Vec<Arc<dyn WebhookBinder>> = Vec::new();
        #[cfg(feature = "http-server")]
        binders.push(webhook_server.clone());

        info!(
            log_level = %config.logging.level,
            handler_timeout_ms = config.dispatch.handler_timeout_ms,
            fan_out = ?config.dispatch.fan_out,
            skills = config.skills.len(),
            "Runtime initialized from configuration"
        );

        Self {
            config: RwLock::new(config),
            config_loader,
            registry,
            stats,
            dispatcher,
            modules: SkillLoader::new(),
            binders: RwLock::new(binders),
            #[cfg(feature = "http-server")]
            webhook_server,
            running: Mutex::new(None),
        }
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> SprocketConfig {
        self.config.read().clone()
    }

    /// The skill registry.
    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    /// The dispatcher events are handed to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Invocation counters.
    pub fn stats(&self) -> &Arc<InMemoryStats> {
        &self.stats
    }

    /// The webhook server; routes are bound on every skill load.
    #[cfg(feature = "http-server")]
    pub fn webhook_server(&self) -> &Arc<WebhookServer> {
        &self.webhook_server
    }

    /// Adds a skill module. It takes effect on the next load.
    pub fn add_module(&self, module: impl SkillModule + 'static) {
        self.modules.add(module);
    }

    /// Adds a receiver of the webhook routes of every published skill set.
    pub fn add_binder(&self, binder: Arc<dyn WebhookBinder>) {
        binder.bind(self.registry.all().webhook_routes());
        self.binders.write().push(binder);
    }

    /// Builds the skill set from the configured skills and rebinds webhook
    /// routes.
    pub fn load_skills(&self) -> LoadReport {
        let skills = self.config.read().skills.clone();
        let report = self.modules.load(&self.registry, &skills);

        let routes = self.registry.all().webhook_routes();
        debug!(routes = routes.len(), "Rebinding webhook routes");
        for binder in self.binders.read().iter() {
            binder.bind(routes.clone());
        }
        report
    }

    /// Loads the configuration again and rebuilds the skill set.
    ///
    /// Without a configuration source the current skill list is reused.
    /// Changes to dispatch or web settings need a restart.
    pub fn reload(&self) -> RuntimeResult<LoadReport> {
        if let Some(loader) = &self.config_loader {
            let fresh = loader.load_validated()?;
            let mut config = self.config.write();
            if fresh.dispatch.handler_timeout_ms != config.dispatch.handler_timeout_ms
                || fresh.dispatch.fan_out != config.dispatch.fan_out
                || fresh.web != config.web
            {
                warn!("Dispatch and web settings changed; they apply after a restart");
            }
            config.skills = fresh.skills;
        }
        info!("Reloading skills");
        Ok(self.load_skills())
    }

    /// Dispatches one event and waits for its handlers.
    pub async fn handle_event(&self, event: Event) -> DispatchReport {
        self.dispatcher.run(event).await
    }

    /// Loads skills, starts the webhook server when enabled, and starts the
    /// cron ticker.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.lock().is_some() {
            warn!("Runtime is already running");
            return Ok(());
        }

        info!("Starting Sprocket runtime");
        let report = self.load_skills();
        if !report.missing.is_empty() {
            warn!(missing = ?report.missing, "Some configured skills have no module");
        }

        let mut running = Running::default();
        let web = self.config.read().web.clone();
        if web.enabled {
            running.listener = self.listen(&web.addr()).await?;
        }
        running.ticker = Some(CronTicker::new(Arc::clone(&self.dispatcher)).spawn());

        *self.running.lock() = Some(running);
        info!("Runtime started");
        Ok(())
    }

    #[cfg(feature = "http-server")]
    async fn listen(&self, addr: &str) -> RuntimeResult<Option<ListenerHandle>> {
        Ok(Some(self.webhook_server.listen(addr).await?))
    }

    #[cfg(not(feature = "http-server"))]
    async fn listen(&self, addr: &str) -> RuntimeResult<Option<ListenerHandle>> {
        warn!(addr, "Webhooks enabled but built without the http-server feature");
        Ok(None)
    }

    /// Stops the webhook server and the cron ticker.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            warn!("Runtime is not running");
            return;
        };

        info!("Stopping Sprocket runtime");
        if let Some(listener) = running.listener {
            listener.stop();
        }
        if let Some(ticker) = running.ticker {
            ticker.abort();
        }
        info!("Runtime stopped");
    }

    /// Whether [`start`](Self::start) has run without a matching stop.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Sprocket runtime is now running. Press Ctrl+C to stop.");
        let result = wait_for_shutdown().await;
        self.stop();
        result
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop();
        Ok(())
    }
}

impl Default for SprocketRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`SprocketRuntime`] with a custom configuration source.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    modules: Vec<Arc<dyn SkillModule>>,
}

impl RuntimeBuilder {
    /// Creates a builder with no modules and the default config search.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            modules: Vec::new(),
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically, below files and environment.
    pub fn merge(mut self, config: SprocketConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Adds a skill module.
    pub fn module(mut self, module: impl SkillModule + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// Loads and validates the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<SprocketRuntime> {
        let config = self.config_loader.load_validated()?;
        let runtime = SprocketRuntime::with_loader(config, Some(self.config_loader));
        for module in self.modules {
            runtime.modules.add_arc(module);
        }
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
