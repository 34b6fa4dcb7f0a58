//! # Sprocket Transport
//!
//! The HTTP surface of webhook skills.
//!
//! The engine decides which routes exist and hands them to a
//! [`WebhookBinder`](sprocket_core::WebhookBinder) after every registry build;
//! this crate implements that binder on top of axum and forwards every hit to
//! a [`WebhookEndpoint`](sprocket_core::WebhookEndpoint).
//!
//! ## Features
//!
//! - `http-server`: the axum-based [`WebhookServer`]
//! - `full`: everything
//!
//! ## Routes
//!
//! | Method | Path | Answer |
//! |--------|------|--------|
//! | `POST` | `/skill/{name}/{segment}` | the endpoint's response, 404 when unbound |
//! | `POST` | `/skill/{name}/{segment}/` | same |
//!
//! ```rust,ignore
//! use sprocket_transport::WebhookServer;
//!
//! let server = WebhookServer::new(dispatcher.clone());
//! server.bind(registry.all().webhook_routes());
//! let handle = server.listen("0.0.0.0:8080").await?;
//! ```

pub mod error;
pub mod listener;

// Transport implementations (feature-gated)
#[cfg(feature = "http-server")]
pub mod http;

pub use error::{TransportError, TransportResult};
pub use listener::ListenerHandle;

#[cfg(feature = "http-server")]
pub use http::WebhookServer;
