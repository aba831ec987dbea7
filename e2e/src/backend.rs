//! Mock backend replicas
//!
//! Every backend records each request it receives into the shared state and
//! answers with either a queued MockResponse or a default body naming itself.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::types::{BackendState, MockResponse, ReceivedRequest, SharedBackendState};

#[derive(Clone)]
struct ReplicaState {
    name: String,
    shared: SharedBackendState,
}

/// Handle any request - record it, then serve the queued or default response
async fn handle_any(State(replica): State<ReplicaState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, 10 * 1024 * 1024)
        .await
        .unwrap_or_default();

    let received = ReceivedRequest {
        backend: replica.name.clone(),
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts
            .headers
            .iter()
            .map(|(n, v)| (n.to_string(), String::from_utf8_lossy(v.as_bytes()).to_string()))
            .collect(),
        body: body_bytes.to_vec(),
    };

    let mock_response = {
        let mut state = replica.shared.lock().unwrap();
        state.received_requests.push(received);
        state.response_queue.pop_front()
    };

    match mock_response {
        Some(mock) => {
            let mut builder = Response::builder().status(mock.status);
            for (name, value) in &mock.headers {
                builder = builder.header(name, value);
            }
            builder.body(Body::from(mock.body)).unwrap()
        }
        None => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .header("X-Backend", &replica.name)
            .body(Body::from(replica.name.clone()))
            .unwrap(),
    }
}

/// Start one mock backend per port; all share the returned state handle
pub async fn start(ports: &[u16]) -> anyhow::Result<SharedBackendState> {
    let state: SharedBackendState = std::sync::Arc::new(std::sync::Mutex::new(BackendState::default()));

    for port in ports {
        let replica = ReplicaState {
            name: port.to_string(),
            shared: state.clone(),
        };
        let app = Router::new().fallback(handle_any).with_state(replica);

        let addr = SocketAddr::from(([127, 0, 0, 1], *port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind mock backend to {}: {}", addr, e))?;

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock backend server failed");
        });
    }

    // Brief pause to let the servers start accepting connections
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    Ok(state)
}

/// Helper to configure the next response served by whichever backend is hit
pub fn queue_response(state: &SharedBackendState, response: MockResponse) {
    state.lock().unwrap().response_queue.push_back(response);
}

/// Helper to get all requests received since last clear
pub fn drain_requests(state: &SharedBackendState) -> Vec<ReceivedRequest> {
    let mut s = state.lock().unwrap();
    s.received_requests.drain(..).collect()
}
