//! The webhook surface shared by the engine and the HTTP layer.
//!
//! The engine never talks HTTP itself. It tells a [`WebhookBinder`] which
//! routes exist after every registry build, and the HTTP layer calls back
//! into a [`WebhookEndpoint`] when one of them is hit.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

/// A `POST` route served for one webhook skill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WebhookRoute {
    /// Config name of the skill (`N` in `/skill/N/segment`).
    pub skill_name: String,
    /// The webhook path segment.
    pub path_segment: String,
}

impl WebhookRoute {
    /// Creates a route.
    pub fn new(skill_name: impl Into<String>, path_segment: impl Into<String>) -> Self {
        Self {
            skill_name: skill_name.into(),
            path_segment: path_segment.into(),
        }
    }

    /// The canonical path, `/skill/{name}/{segment}`.
    pub fn path(&self) -> String {
        format!("/skill/{}/{}", self.skill_name, self.path_segment)
    }

    /// Both bound paths: the canonical one and its trailing-slash variant.
    pub fn paths(&self) -> [String; 2] {
        let path = self.path();
        let slashed = format!("{path}/");
        [path, slashed]
    }
}

/// An HTTP-style response produced by a webhook invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl WebhookResponse {
    /// The default acknowledgement: `200 {"called_skill": segment}`.
    pub fn called(path_segment: &str) -> Self {
        Self {
            status: 200,
            body: json!({ "called_skill": path_segment }),
        }
    }

    /// A handler failure.
    pub fn failed(path_segment: &str, error: &str) -> Self {
        Self {
            status: 500,
            body: json!({ "called_skill": path_segment, "error": error }),
        }
    }

    /// A handler that ran out of time.
    pub fn timed_out(path_segment: &str) -> Self {
        Self {
            status: 504,
            body: json!({ "called_skill": path_segment, "error": "timed out" }),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Receives webhook calls from the HTTP layer.
#[async_trait]
pub trait WebhookEndpoint: Send + Sync {
    /// Runs the webhook skills bound to `/skill/{skill_name}/{path_segment}`.
    ///
    /// Returns `None` when no skill matched; the HTTP layer answers 404.
    async fn call_webhook(
        &self,
        skill_name: &str,
        path_segment: &str,
        payload: Value,
    ) -> Option<WebhookResponse>;
}

/// Type-erased webhook endpoint.
pub type BoxedWebhookEndpoint = Arc<dyn WebhookEndpoint>;

/// An HTTP server that can be told which webhook routes to serve.
pub trait WebhookBinder: Send + Sync {
    /// Replaces the set of bound routes.
    fn bind(&self, routes: Vec<WebhookRoute>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        let route = WebhookRoute::new("demo", "ping");
        assert_eq!(route.path(), "/skill/demo/ping");
        assert_eq!(
            route.paths(),
            ["/skill/demo/ping".to_string(), "/skill/demo/ping/".to_string()]
        );
    }

    #[test]
    fn test_called_body() {
        let response = WebhookResponse::called("ping");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"called_skill": "ping"}));
        assert!(response.is_success());
        assert!(!WebhookResponse::timed_out("ping").is_success());
    }
}
