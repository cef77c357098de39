use crate::domain::entities::proxy::ProxyEndpoint;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of probing one proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub reachable: bool,
    pub latency: Option<Duration>,
}

impl ProbeReport {
    pub fn reachable(latency: Duration) -> Self {
        ProbeReport {
            reachable: true,
            latency: Some(latency),
        }
    }

    pub fn unreachable() -> Self {
        ProbeReport {
            reachable: false,
            latency: None,
        }
    }
}

/// Liveness check for a proxy endpoint. Implementations decide what
/// "reachable" means; the health checker only consumes the verdict.
#[async_trait]
pub trait ProxyProbe: Send + Sync {
    async fn probe(&self, endpoint: &ProxyEndpoint) -> ProbeReport;
}
