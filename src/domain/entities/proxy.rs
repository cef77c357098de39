use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI8, Ordering};

/// Lowest rating a proxy can reach. Hitting it deactivates the proxy.
pub const RATING_FLOOR: i8 = -10;

/// Highest rating a proxy can reach.
pub const RATING_CEILING: i8 = 10;

/// Rating assigned on registration and after reactivation.
pub const INITIAL_RATING: i8 = 0;

/// Transport used to reach a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyKind {
    Http,
    Https,
    Socks5,
}

impl ProxyKind {
    pub fn as_scheme(&self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
            ProxyKind::Socks5 => "socks5",
        }
    }

    pub fn parse(raw: &str) -> Option<ProxyKind> {
        match raw.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyKind::Http),
            "https" => Some(ProxyKind::Https),
            "socks5" => Some(ProxyKind::Socks5),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_scheme())
    }
}

/// Egress identity of a proxy. Two registrations with the same endpoint
/// refer to the same proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub kind: ProxyKind,
    pub addr: SocketAddr,
}

impl ProxyEndpoint {
    pub fn new(kind: ProxyKind, addr: SocketAddr) -> Self {
        ProxyEndpoint { kind, addr }
    }
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.kind.as_scheme(), self.addr)
    }
}

/// A pooled proxy with its quality state.
///
/// Rating and activation are atomics so callers, the scheduler and the
/// health checker can share one handle without locking. A proxy whose
/// rating falls to [`RATING_FLOOR`] is deactivated and stays inactive
/// until [`Proxy::reactivate`] is called.
#[derive(Debug)]
pub struct Proxy {
    endpoint: ProxyEndpoint,
    rating: AtomicI8,
    active: AtomicBool,
}

impl Proxy {
    pub fn new(endpoint: ProxyEndpoint) -> Self {
        Proxy {
            endpoint,
            rating: AtomicI8::new(INITIAL_RATING),
            active: AtomicBool::new(true),
        }
    }

    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }

    pub fn rating(&self) -> i8 {
        self.rating.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Raise the rating by one, clamped to [`RATING_CEILING`].
    ///
    /// Does not reactivate a deactivated proxy; that decision belongs to
    /// the health checker.
    pub fn record_success(&self) -> i8 {
        let previous = self
            .rating
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| {
                Some((r + 1).min(RATING_CEILING))
            });
        previous
            .map(|r| (r + 1).min(RATING_CEILING))
            .unwrap_or(RATING_CEILING)
    }

    /// Lower the rating by one, clamped to [`RATING_FLOOR`]. Reaching the
    /// floor deactivates the proxy.
    pub fn record_failure(&self) -> i8 {
        let previous = self
            .rating
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| {
                Some((r - 1).max(RATING_FLOOR))
            });
        let rating = previous.map(|r| (r - 1).max(RATING_FLOOR)).unwrap_or(RATING_FLOOR);
        if rating == RATING_FLOOR {
            self.active.store(false, Ordering::SeqCst);
        }
        rating
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Bring a proxy back into rotation with a neutral rating.
    pub fn reactivate(&self) {
        self.rating.store(INITIAL_RATING, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }
}
