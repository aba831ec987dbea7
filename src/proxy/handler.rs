//! Request dispatch: pick a backend, hand the request to its forwarder

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::backends::BackendRegistry;

/// Serving entry point bound to one registry.
///
/// Holds no per-request state; clones share the same registry and cursor.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Handle an incoming request
    pub async fn dispatch(&self, req: Request<Body>) -> Response {
        let index = self.registry.next_index();
        let backend = &self.registry.backends()[index];

        tracing::debug!(index, backend = %backend.url, "Selected backend");

        match backend.forwarder.forward(req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(backend = %backend.url, error = %e, "Failed to forward request");
                e.into_response()
            }
        }
    }
}
