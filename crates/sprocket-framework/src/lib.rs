//! # Sprocket Framework
//!
//! The moving parts of the Sprocket skill engine:
//!
//! - [`SkillRegistry`]: ordered, copy-then-swap storage of skills
//! - [`Registrar`]: the registration API skill modules use
//! - [`Dispatcher`]: best-of selection for conversations, fan-out for timers
//!   and webhooks
//! - [`ExecutionSupervisor`]: runs handlers under a timeout and turns every
//!   failure into an [`Outcome`]
//! - [`Handler`] / [`FromContext`]: Axum-style handlers with extractors
//!
//! ```rust,ignore
//! let registry = Arc::new(SkillRegistry::new());
//! let mut registrar = Registrar::new(registry.builder(), SkillConfig::new("hello"));
//! registrar.regex("^hello$", greet);
//! registry.clear_and_rebuild(registrar.finish());
//!
//! let dispatcher = Dispatcher::new(registry, ExecutionSupervisor::new(Arc::new(NoopStats)));
//! dispatcher.run(Event::message("hello")).await;
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod registration;
pub mod registry;
pub mod skill;
pub mod stats;
pub mod supervisor;

pub use context::SkillContext;
pub use dispatcher::{DispatchReport, Dispatcher, FanOutMode, InvocationReport, SkillMatch};
pub use error::{BoxError, ExtractError, ExtractResult, HandlerError, HandlerPanic, TimeoutError};
pub use extractor::{FireTime, FromContext, MatchParams, MessageText, Options, Payload};
pub use handler::{
    BoxedHandler, Handler, HandlerResult, HandlerService, IntoHandlerResult, into_handler,
};
pub use registration::{AlwaysOptions, Registrar};
pub use registry::{SkillRegistry, SkillSet, SkillSetBuilder};
pub use skill::{Skill, SkillId};
pub use stats::{DispatchKind, InMemoryStats, NoopStats, StatsSink};
pub use supervisor::{ExecutionSupervisor, Outcome};
