//! Axum server for webhook skills.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, trace};

use sprocket_core::{BoxedWebhookEndpoint, WebhookBinder, WebhookRoute};

use crate::error::{TransportError, TransportResult};
use crate::listener::ListenerHandle;

/// Serves `POST /skill/{name}/{segment}` for the currently bound routes.
///
/// Routes are swapped wholesale through [`WebhookBinder::bind`]; a request
/// for a route that is not bound is answered with 404 without reaching the
/// endpoint.
pub struct WebhookServer {
    endpoint: BoxedWebhookEndpoint,
    routes: RwLock<HashSet<WebhookRoute>>,
}

impl WebhookServer {
    /// Creates a server forwarding to `endpoint`, with no route bound yet.
    pub fn new(endpoint: BoxedWebhookEndpoint) -> Arc<Self> {
        Arc::new(Self {
            endpoint,
            routes: RwLock::new(HashSet::new()),
        })
    }

    /// The bound routes, sorted by path.
    pub fn routes(&self) -> Vec<WebhookRoute> {
        let mut routes: Vec<_> = self.routes.read().iter().cloned().collect();
        routes.sort_by_key(WebhookRoute::path);
        routes
    }

    /// Whether `/skill/{skill_name}/{path_segment}` is bound.
    pub fn is_bound(&self, skill_name: &str, path_segment: &str) -> bool {
        self.routes
            .read()
            .contains(&WebhookRoute::new(skill_name, path_segment))
    }

    /// Builds the axum router.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/skill/{name}/{segment}", post(webhook_handler))
            .route("/skill/{name}/{segment}/", post(webhook_handler))
            .with_state(Arc::clone(self))
    }

    /// Starts serving on `addr`.
    pub async fn listen(self: &Arc<Self>, addr: &str) -> TransportResult<ListenerHandle> {
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let actual_addr = listener.local_addr()?;

        info!(addr = %actual_addr, "Webhook server listening");

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let server = axum::serve(listener, router);

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!(error = %e, "Webhook server error");
                    }
                }
                _ = &mut shutdown_rx => {
                    info!("Webhook server shutting down");
                }
            }
        });

        Ok(ListenerHandle::new(
            format!("webhook-server-{actual_addr}"),
            shutdown_tx,
        ))
    }
}

impl WebhookBinder for WebhookServer {
    fn bind(&self, routes: Vec<WebhookRoute>) {
        for route in &routes {
            debug!(path = %route.path(), "Binding webhook route");
        }
        let count = routes.len();
        *self.routes.write() = routes.into_iter().collect();
        info!(routes = count, "Webhook routes bound");
    }
}

/// Body as JSON when it parses, otherwise as a string; empty is null.
fn parse_payload(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// `POST /skill/{name}/{segment}` handler.
async fn webhook_handler(
    State(server): State<Arc<WebhookServer>>,
    Path((name, segment)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    if !server.is_bound(&name, &segment) {
        debug!(skill = %name, segment = %segment, "Webhook route not bound");
        return StatusCode::NOT_FOUND.into_response();
    }

    trace!(skill = %name, segment = %segment, len = body.len(), "Received webhook call");

    match server
        .endpoint
        .call_webhook(&name, &segment, parse_payload(&body))
        .await
    {
        Some(response) => {
            let status =
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(response.body)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
