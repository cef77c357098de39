use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque identity of a rate-limited endpoint, usually one exchange API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        DestinationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DestinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(id: &str) -> Self {
        DestinationId(id.to_string())
    }
}

/// Rate-limit contract of a destination, snapshotted from its adapter at
/// registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationProfile {
    pub id: DestinationId,
    /// How long a fetched result stays representative. Cached call results
    /// served within this interval; also the trade poller cadence.
    pub update_interval: Duration,
    /// Cool-down before the same proxy may be recommended again for this
    /// destination.
    pub min_request_interval: Duration,
    /// Whether this destination accepts proxied egress at all.
    pub proxy_allowed: bool,
    /// Advisory cap on concurrent proxied requests. Carried for callers;
    /// the gateway itself does not gate concurrency on it.
    pub parallelism_limit: usize,
}

impl DestinationProfile {
    pub fn new(id: impl Into<DestinationId>, update_interval: Duration) -> Self {
        DestinationProfile {
            id: id.into(),
            update_interval,
            min_request_interval: Duration::ZERO,
            proxy_allowed: true,
            parallelism_limit: 1,
        }
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn with_proxy_allowed(mut self, allowed: bool) -> Self {
        self.proxy_allowed = allowed;
        self
    }

    pub fn with_parallelism_limit(mut self, limit: usize) -> Self {
        self.parallelism_limit = limit;
        self
    }
}

impl From<String> for DestinationId {
    fn from(id: String) -> Self {
        DestinationId(id)
    }
}
