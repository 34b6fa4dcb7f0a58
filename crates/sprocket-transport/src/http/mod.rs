//! HTTP transport.

mod server;

pub use server::WebhookServer;
