use crate::domain::entities::destination::{DestinationId, DestinationProfile};
use crate::domain::entities::proxy::Proxy;
use crate::domain::errors::SchedulerError;
use crate::domain::services::proxy_pool::{
    lock_or_recover, read_or_recover, write_or_recover, ProxyPool,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One entry in a destination's recommendation log.
struct Recommendation {
    proxy: Arc<Proxy>,
    at: Instant,
}

/// Per-destination rotation state.
///
/// `available` holds proxies that may be recommended right now, oldest
/// first. `recommended` is the log of handed-out proxies ordered by
/// recommendation time; an entry returns to `available` once the
/// destination's cool-down has elapsed.
struct Lane {
    min_request_interval: std::time::Duration,
    available: VecDeque<Arc<Proxy>>,
    recommended: VecDeque<Recommendation>,
}

impl Lane {
    fn holds(&self, proxy: &Proxy) -> bool {
        self.available
            .iter()
            .any(|p| p.endpoint() == proxy.endpoint())
            || self
                .recommended
                .iter()
                .any(|r| r.proxy.endpoint() == proxy.endpoint())
    }

    /// Move every cooled-down log entry back into rotation, dropping
    /// entries whose proxy was deactivated meanwhile. Returns whether
    /// anything rejoined `available`.
    fn recycle_cooled(&mut self, now: Instant) -> bool {
        let mut moved = false;
        while let Some(entry) = self.recommended.front() {
            if now.duration_since(entry.at) < self.min_request_interval {
                break;
            }
            if let Some(entry) = self.recommended.pop_front() {
                if entry.proxy.is_active() {
                    self.available.push_back(entry.proxy);
                    moved = true;
                }
            }
        }
        moved
    }
}

/// Hands out a rate-compliant proxy per destination.
///
/// Each registered destination gets its own lane, so one proxy can serve
/// many destinations concurrently while never being recommended twice for
/// the same destination within its cool-down, except when no alternative
/// exists (degraded reuse of the least recently recommended proxy).
///
/// `recommend` never blocks and never sleeps. If a caller wants to wait
/// out a cool-down instead of degrading, that wait is the caller's.
pub struct ProxyScheduler {
    pool: Arc<ProxyPool>,
    lanes: RwLock<HashMap<DestinationId, Arc<Mutex<Lane>>>>,
}

impl ProxyScheduler {
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        ProxyScheduler {
            pool,
            lanes: RwLock::new(HashMap::new()),
        }
    }

    /// Create the lane for a destination, seeded with every currently
    /// active pool proxy. Re-registering keeps the existing lane.
    pub fn register_destination(&self, profile: &DestinationProfile) {
        let mut lanes = write_or_recover(&self.lanes);
        if lanes.contains_key(&profile.id) {
            debug!(destination = %profile.id, "Destination lane already exists");
            return;
        }
        let available: VecDeque<Arc<Proxy>> = self.pool.active_proxies().into_iter().collect();
        info!(
            destination = %profile.id,
            seeded = available.len(),
            cooldown_ms = profile.min_request_interval.as_millis(),
            "Destination registered with scheduler"
        );
        lanes.insert(
            profile.id.clone(),
            Arc::new(Mutex::new(Lane {
                min_request_interval: profile.min_request_interval,
                available,
                recommended: VecDeque::new(),
            })),
        );
    }

    /// Drop a destination's lane. Returns false if it was never registered.
    pub fn forget_destination(&self, destination: &DestinationId) -> bool {
        let removed = write_or_recover(&self.lanes).remove(destination).is_some();
        if removed {
            info!(destination = %destination, "Destination lane dropped");
        }
        removed
    }

    pub fn is_registered(&self, destination: &DestinationId) -> bool {
        read_or_recover(&self.lanes).contains_key(destination)
    }

    /// Add a newly registered proxy to every existing lane. Lanes that
    /// already hold the endpoint are left alone.
    pub fn admit_proxy(&self, proxy: &Arc<Proxy>) {
        let lanes = read_or_recover(&self.lanes);
        for (destination, lane) in lanes.iter() {
            let mut lane = lock_or_recover(lane);
            if lane.holds(proxy) {
                continue;
            }
            lane.available.push_back(proxy.clone());
            debug!(destination = %destination, proxy = %proxy.endpoint(), "Proxy admitted to lane");
        }
    }

    /// Pick the proxy to use for the next request to `destination`.
    ///
    /// Preference order: a proxy that has not been recommended within the
    /// cool-down; failing that, the least recently recommended active
    /// proxy (degraded reuse). Deactivated proxies are dropped from the
    /// lane as they surface.
    pub fn recommend(&self, destination: &DestinationId) -> Result<Arc<Proxy>, SchedulerError> {
        let lane = read_or_recover(&self.lanes)
            .get(destination)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownDestination {
                destination: destination.to_string(),
            })?;

        let mut lane = lock_or_recover(&lane);
        let now = Instant::now();

        loop {
            while let Some(proxy) = lane.available.pop_front() {
                if !proxy.is_active() {
                    debug!(
                        destination = %destination,
                        proxy = %proxy.endpoint(),
                        "Dropping deactivated proxy from lane"
                    );
                    continue;
                }
                lane.recommended.push_back(Recommendation {
                    proxy: proxy.clone(),
                    at: now,
                });
                debug!(destination = %destination, proxy = %proxy.endpoint(), "Proxy recommended");
                return Ok(proxy);
            }

            if !lane.recycle_cooled(now) {
                break;
            }
        }

        // Degraded path: every proxy is still cooling down. Reuse the one
        // recommended longest ago rather than failing the request.
        while let Some(entry) = lane.recommended.pop_front() {
            if !entry.proxy.is_active() {
                continue;
            }
            let proxy = entry.proxy;
            lane.recommended.push_back(Recommendation {
                proxy: proxy.clone(),
                at: now,
            });
            debug!(
                destination = %destination,
                proxy = %proxy.endpoint(),
                "Cool-down pending on every proxy, reusing least recently recommended"
            );
            return Ok(proxy);
        }

        warn!(destination = %destination, "No active proxy left for destination");
        Err(SchedulerError::NoProxyAvailable {
            destination: destination.to_string(),
        })
    }
}
