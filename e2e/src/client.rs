//! HTTP client that talks to the proxy like any downstream caller

use reqwest::{Client, Method};

use crate::types::ProxyResponse;

/// Build an HTTP client
pub fn build_client() -> Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build reqwest client")
}

/// Send a request to the proxy and collect the full response
pub async fn send(
    client: &Client,
    proxy_addr: &str,
    method: Method,
    path_and_query: &str,
    headers: &[(&str, &str)],
    body: Option<Vec<u8>>,
) -> anyhow::Result<ProxyResponse> {
    let url = format!("http://{proxy_addr}{path_and_query}");

    let mut req = client.request(method.clone(), &url);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    if let Some(body) = body {
        req = req.body(body);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to {} {}: {}", method, url, e))?;

    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = resp
        .bytes()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read proxy response: {}", e))?;

    Ok(ProxyResponse { status, headers, body })
}

/// Send a GET request to the proxy
pub async fn send_get(client: &Client, proxy_addr: &str, path: &str) -> anyhow::Result<ProxyResponse> {
    send(client, proxy_addr, Method::GET, path, &[], None).await
}
