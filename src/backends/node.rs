//! Runtime handle for a single backend replica

use axum::http::uri::InvalidUri;
use url::Url;

use super::registry::RegistryError;
use crate::config::ForwardingConfig;
use crate::proxy::Forwarder;

/// A single backend replica with its own forwarder
pub struct Backend {
    pub url: Url,
    pub forwarder: Forwarder,
}

impl Backend {
    /// Construct a Backend and bind a forwarder to its address
    pub fn from_config(url: Url, forwarding: &ForwardingConfig) -> Result<Self, InvalidUri> {
        let forwarder = Forwarder::new(&url, forwarding)?;
        Ok(Self { url, forwarder })
    }

    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}

/// Parse and validate a replica address from the `service` section
pub fn parse_backend_url(service: &str, address: &str) -> Result<Url, RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidBackendAddress {
        service: service.to_string(),
        address: address.to_string(),
        reason,
    };

    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(invalid("address is empty".to_string()));
    }

    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;

    // "localhost:8080" parses as scheme "localhost"
    match url.scheme() {
        "http" => {}
        "https" => return Err(invalid("https backends are not supported, use http".to_string())),
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }

    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("credentials are not allowed in a backend address".to_string()));
    }
    // The inbound path is appended after the address, so it must end at the path
    if url.query().is_some() {
        return Err(invalid("query strings are not allowed in a backend address".to_string()));
    }
    if url.fragment().is_some() {
        return Err(invalid("fragments are not allowed in a backend address".to_string()));
    }

    Ok(url)
}
