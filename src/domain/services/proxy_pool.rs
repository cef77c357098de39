use crate::domain::entities::proxy::{Proxy, ProxyEndpoint, ProxyKind};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Mutex poisoned (previous holder panicked), recovering");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn read_or_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("RwLock poisoned (previous holder panicked), recovering");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn write_or_recover<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("RwLock poisoned (previous holder panicked), recovering");
            poisoned.into_inner()
        }
    }
}

/// Registry of every proxy known to the gateway, keyed by endpoint.
///
/// Registration is idempotent: the same endpoint always resolves to the
/// same shared handle, so ratings survive repeated imports. Deactivated
/// proxies stay registered; schedulers skip them when encountered.
pub struct ProxyPool {
    proxies: RwLock<HashMap<ProxyEndpoint, Arc<Proxy>>>,
}

impl ProxyPool {
    pub fn new() -> Self {
        ProxyPool {
            proxies: RwLock::new(HashMap::new()),
        }
    }

    /// Register a proxy, returning its shared handle. Re-registering an
    /// existing endpoint returns the existing handle untouched.
    pub fn register(&self, kind: ProxyKind, addr: SocketAddr) -> Arc<Proxy> {
        let endpoint = ProxyEndpoint::new(kind, addr);
        let mut proxies = write_or_recover(&self.proxies);
        if let Some(existing) = proxies.get(&endpoint) {
            debug!(proxy = %endpoint, "Proxy already registered, reusing handle");
            return existing.clone();
        }
        let proxy = Arc::new(Proxy::new(endpoint));
        proxies.insert(endpoint, proxy.clone());
        info!(proxy = %endpoint, pool_size = proxies.len(), "Proxy registered");
        proxy
    }

    /// Remove a proxy from the registry. Handles already held by callers
    /// stay valid; only future lookups stop finding it.
    pub fn deregister(&self, endpoint: &ProxyEndpoint) -> Option<Arc<Proxy>> {
        let mut proxies = write_or_recover(&self.proxies);
        let removed = proxies.remove(endpoint);
        if removed.is_some() {
            info!(proxy = %endpoint, pool_size = proxies.len(), "Proxy deregistered");
        }
        removed
    }

    pub fn get(&self, endpoint: &ProxyEndpoint) -> Option<Arc<Proxy>> {
        read_or_recover(&self.proxies).get(endpoint).cloned()
    }

    pub fn active_proxies(&self) -> Vec<Arc<Proxy>> {
        read_or_recover(&self.proxies)
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect()
    }

    pub fn all_proxies(&self) -> Vec<Arc<Proxy>> {
        read_or_recover(&self.proxies).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read_or_recover(&self.proxies).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new()
    }
}
