use crate::domain::entities::destination::DestinationId;
use crate::domain::entities::trade::Trade;
use crate::domain::value_objects::market::{Depth, Ticker};
use crate::domain::value_objects::pair::Pair;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache performance statistics
#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// One argument of a cached call. Argument order is significant: the same
/// values in a different order form a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallArg {
    Pair(Pair),
    Micros(i64),
    Text(String),
}

/// Structural identity of one destination call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub destination: DestinationId,
    pub operation: String,
    pub args: Vec<CallArg>,
}

impl CallKey {
    pub fn new(destination: DestinationId, operation: impl Into<String>, args: Vec<CallArg>) -> Self {
        CallKey {
            destination,
            operation: operation.into(),
            args,
        }
    }
}

/// Payload of a cached call result.
#[derive(Debug, Clone)]
pub enum CallValue {
    Depth(Depth),
    Ticker(Ticker),
    Trades(Vec<Trade>),
}

struct StoredCall {
    value: CallValue,
    stored_at: Instant,
    ttl: Duration,
}

/// TTL cache over destination call results.
///
/// An entry is valid while `now - stored_at < ttl`, where the ttl is the
/// owning destination's update interval at store time. Lookup is
/// two-phase: find by key, then check freshness; a stale entry is evicted
/// on sight and reported as a miss. Capacity-bounded so an open-ended set
/// of (operation, args) combinations cannot grow without limit.
pub struct CallResultCache {
    entries: LruCache<CallKey, StoredCall>,
    stats: CacheStats,
}

impl CallResultCache {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("Cache capacity must be non-zero");
        CallResultCache {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn lookup(&mut self, key: &CallKey) -> Option<CallValue> {
        let hit = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                debug!(
                    destination = %key.destination,
                    operation = %key.operation,
                    "Call cache miss"
                );
                return None;
            }
            Some(stored) => {
                let age = stored.stored_at.elapsed();
                if age < stored.ttl {
                    Some((stored.value.clone(), age))
                } else {
                    None
                }
            }
        };

        match hit {
            Some((value, age)) => {
                self.stats.hits += 1;
                debug!(
                    destination = %key.destination,
                    operation = %key.operation,
                    age_ms = age.as_millis(),
                    hit_rate = format!("{:.2}%", self.stats.hit_rate()),
                    "Call cache hit"
                );
                Some(value)
            }
            None => {
                // Found but stale: evict on sight so it can never be served.
                self.entries.pop(key);
                self.stats.evictions += 1;
                self.stats.misses += 1;
                debug!(
                    destination = %key.destination,
                    operation = %key.operation,
                    "Call cache entry expired"
                );
                None
            }
        }
    }

    pub fn store(&mut self, key: CallKey, value: CallValue, ttl: Duration) {
        debug!(
            destination = %key.destination,
            operation = %key.operation,
            ttl_ms = ttl.as_millis(),
            "Call result stored"
        );
        let stored = StoredCall {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        if let Some((displaced, _)) = self.entries.push(key.clone(), stored) {
            if displaced != key {
                self.stats.evictions += 1;
                debug!(
                    destination = %displaced.destination,
                    operation = %displaced.operation,
                    "Call cache displaced least recently used entry"
                );
            }
        }
    }

    /// Drop every entry belonging to one destination. Used when the
    /// destination deregisters.
    pub fn invalidate_destination(&mut self, destination: &DestinationId) -> usize {
        let doomed: Vec<CallKey> = self
            .entries
            .iter()
            .filter(|(key, _)| &key.destination == destination)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.entries.pop(key);
        }
        if !doomed.is_empty() {
            debug!(
                destination = %destination,
                removed = doomed.len(),
                "Call cache entries invalidated"
            );
        }
        doomed.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
