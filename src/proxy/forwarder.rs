//! Per-backend request forwarding
//!
//! A [`Forwarder`] relays one inbound request to the backend it is bound to and
//! streams the backend's response back. Bodies are never buffered: the inbound
//! body is piped into the upstream request and the upstream body is piped into
//! the outbound response. Dropping the returned future (client disconnect)
//! drops the upstream request with it.
//!
//! The upstream URI is assembled from the backend origin and the inbound
//! path-and-query bytes as received; nothing is re-parsed or normalized.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, InvalidUri, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::{Position, Url};

use crate::config::ForwardingConfig;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Connection-scoped headers that must not cross the proxy
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Per-request forwarding failure
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Backend {backend} unavailable: {source}")]
    Unavailable {
        backend: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("Backend {backend} did not respond within {after:?}")]
    Timeout { backend: String, after: Duration },

    #[error("Cannot build upstream URI for backend {backend}: {source}")]
    Uri {
        backend: String,
        #[source]
        source: axum::http::Error,
    },
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, self.to_string()).into_response()
    }
}

/// Relays requests to a single backend
pub struct Forwarder {
    backend: String,
    authority: Authority,
    path_prefix: String,
    request_timeout: Option<Duration>,
    http_client: Client<HttpConnector, Body>,
}

impl Forwarder {
    /// Bind a forwarder to `target`, an `http` origin with an optional path prefix
    pub fn new(target: &Url, config: &ForwardingConfig) -> Result<Self, InvalidUri> {
        let authority: Authority = target[Position::BeforeHost..Position::AfterPort].parse()?;

        Ok(Self {
            backend: target.as_str().trim_end_matches('/').to_string(),
            authority,
            path_prefix: target.path().trim_end_matches('/').to_string(),
            request_timeout: config.timeout_seconds.map(Duration::from_secs),
            http_client: build_forwarding_client(config),
        })
    }

    /// Forward `req` to the bound backend and stream the response back
    pub async fn forward(&self, req: Request<Body>) -> Result<Response, UpstreamError> {
        let (mut parts, body) = req.into_parts();

        parts.uri = self.target_uri(&parts.uri).map_err(|source| UpstreamError::Uri {
            backend: self.backend.clone(),
            source,
        })?;
        // The upstream leg is always HTTP/1.1 regardless of the inbound version
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        // The client sets Host from the URI authority
        parts.headers.remove(header::HOST);

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        if let Some(ip) = peer {
            append_forwarded_for(&mut parts.headers, ip);
        }

        let upstream = self.http_client.request(Request::from_parts(parts, body));
        let result = match self.request_timeout {
            Some(after) => tokio::time::timeout(after, upstream)
                .await
                .map_err(|_| UpstreamError::Timeout {
                    backend: self.backend.clone(),
                    after,
                })?,
            None => upstream.await,
        };
        let backend_response = result.map_err(|source| UpstreamError::Unavailable {
            backend: self.backend.clone(),
            source,
        })?;

        let (mut parts, body) = backend_response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    /// Upstream URI for an inbound URI: backend origin, then the backend path
    /// prefix, then the inbound path and query byte-for-byte
    fn target_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let inbound = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(format!("{}{}", self.path_prefix, inbound))
            .build()
    }
}

/// Build the upstream client; it follows no redirects and decodes nothing
fn build_forwarding_client(config: &ForwardingConfig) -> Client<HttpConnector, Body> {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_seconds)));

    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build(connector)
}

/// Remove hop-by-hop headers, including any listed in `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Append the client IP to X-Forwarded-For, keeping prior hops
fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_forwarder(url: &str) -> Forwarder {
        Forwarder::new(&Url::parse(url).unwrap(), &ForwardingConfig::default()).unwrap()
    }

    fn target(forwarder: &Forwarder, inbound: &str) -> String {
        let uri: Uri = inbound.parse().unwrap();
        forwarder.target_uri(&uri).unwrap().to_string()
    }

    #[test]
    fn test_target_uri_path_and_query() {
        let forwarder = make_forwarder("http://127.0.0.1:9001");
        assert_eq!(
            target(&forwarder, "/v1/items?id=7&sort=desc%20x"),
            "http://127.0.0.1:9001/v1/items?id=7&sort=desc%20x"
        );
    }

    #[test]
    fn test_target_uri_root() {
        let forwarder = make_forwarder("http://127.0.0.1:9001/");
        assert_eq!(target(&forwarder, "/"), "http://127.0.0.1:9001/");
    }

    #[test]
    fn test_target_uri_with_backend_prefix() {
        let forwarder = make_forwarder("http://backend:8080/api/");
        assert_eq!(target(&forwarder, "/users?active"), "http://backend:8080/api/users?active");
    }

    #[test]
    fn test_target_uri_keeps_raw_segments() {
        let forwarder = make_forwarder("http://127.0.0.1:9001");
        for inbound in ["/a/./b/../c", "/files/%2e%2e/etc", "/x{1}?y={z}", "/p?k='q'&t=a`b"] {
            assert_eq!(target(&forwarder, inbound), format!("http://127.0.0.1:9001{}", inbound));
        }
    }

    #[test]
    fn test_target_uri_default_port_not_added() {
        let forwarder = make_forwarder("http://backend.internal/");
        assert_eq!(target(&forwarder, "/ping"), "http://backend.internal/ping");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, X-Session-Hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn test_append_forwarded_for_new() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.7".parse().unwrap());
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "10.0.0.7");
    }

    #[test]
    fn test_append_forwarded_for_existing_hops() {
        let mut headers = HeaderMap::new();
        headers.append("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        headers.append("x-forwarded-for", HeaderValue::from_static("198.51.100.2"));

        append_forwarded_for(&mut headers, "10.0.0.7".parse().unwrap());

        let values: Vec<_> = headers.get_all("x-forwarded-for").iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "203.0.113.1, 198.51.100.2, 10.0.0.7");
    }

    #[tokio::test]
    async fn test_upstream_error_is_bad_gateway() {
        let forwarder = make_forwarder("http://127.0.0.1:1");

        let result = forwarder.forward(Request::new(Body::empty())).await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("127.0.0.1:1"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_request_timeout_is_bad_gateway() {
        // Accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _held = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let config = ForwardingConfig {
            timeout_seconds: Some(1),
            ..ForwardingConfig::default()
        };
        let url = Url::parse(&format!("http://{}", addr)).unwrap();
        let forwarder = Forwarder::new(&url, &config).unwrap();

        let err = forwarder.forward(Request::new(Body::empty())).await.err().unwrap();
        assert!(matches!(err, UpstreamError::Timeout { .. }));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
