use crate::domain::entities::proxy::ProxyEndpoint;
use crate::domain::repositories::exchange_adapter::{AdapterError, AdapterResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// URL form of a proxy endpoint, e.g. `socks5://10.0.0.1:1080`.
pub fn proxy_url(endpoint: &ProxyEndpoint) -> AdapterResult<Url> {
    Url::parse(&endpoint.to_string())
        .map_err(|e| AdapterError::Network(format!("Invalid proxy endpoint {}: {}", endpoint, e)))
}

/// HTTP client routing all traffic through one proxy.
pub fn egress_client(endpoint: &ProxyEndpoint, timeout: Duration) -> AdapterResult<Client> {
    let proxy = reqwest::Proxy::all(proxy_url(endpoint)?)
        .map_err(|e| AdapterError::Network(format!("Rejected proxy {}: {}", endpoint, e)))?;
    Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .build()
        .map_err(|e| AdapterError::Network(format!("Failed to build proxied client: {}", e)))
}

/// HTTP client without a proxy, for destinations that refuse proxied
/// egress.
pub fn direct_client(timeout: Duration) -> AdapterResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdapterError::Network(format!("Failed to build client: {}", e)))
}

/// GET a JSON document, mapping transport, status and decode failures
/// onto adapter errors. Response bodies of rejected requests are logged,
/// not carried in the error.
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> AdapterResult<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AdapterError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %error_text, "Request rejected");
        return Err(AdapterError::Http(status.as_u16()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| AdapterError::Network(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| AdapterError::Malformed(e.to_string()))
}
