use crate::config::GatewayConfig;
use crate::domain::entities::proxy::ProxyEndpoint;
use crate::domain::repositories::proxy_probe::{ProbeReport, ProxyProbe};
use crate::infrastructure::egress::egress_client;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// Probes a proxy by fetching a small well-known document through it.
pub struct HttpProxyProbe {
    probe_url: String,
    timeout: Duration,
}

impl HttpProxyProbe {
    pub fn new(probe_url: impl Into<String>, timeout: Duration) -> Self {
        HttpProxyProbe {
            probe_url: probe_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.probe_url.clone(), config.egress_timeout)
    }
}

#[async_trait]
impl ProxyProbe for HttpProxyProbe {
    async fn probe(&self, endpoint: &ProxyEndpoint) -> ProbeReport {
        let started = Instant::now();
        let client = match egress_client(endpoint, self.timeout) {
            Ok(client) => client,
            Err(e) => {
                debug!(proxy = %endpoint, error = %e, "Could not build probe client");
                return ProbeReport::unreachable();
            }
        };

        match client.get(&self.probe_url).send().await {
            Ok(response) if response.status().is_success() => {
                let latency = started.elapsed();
                debug!(proxy = %endpoint, latency_ms = latency.as_millis(), "Probe succeeded");
                ProbeReport::reachable(latency)
            }
            Ok(response) => {
                debug!(
                    proxy = %endpoint,
                    status = %response.status(),
                    "Probe target answered with error status"
                );
                ProbeReport::unreachable()
            }
            Err(e) => {
                debug!(proxy = %endpoint, error = %e, "Probe request failed");
                ProbeReport::unreachable()
            }
        }
    }
}
