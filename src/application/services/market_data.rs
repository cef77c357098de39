//! Market Data Facade
//!
//! Single entry point for market data consumers. Every read goes through
//! the call result cache or the trade history window before an adapter is
//! contacted, so destinations see at most one request per update interval
//! per distinct call. Failures are reported as-is; the gateway never
//! retries on a caller's behalf.

use crate::application::services::trade_history::TradeHistoryCache;
use crate::config::GatewayConfig;
use crate::domain::entities::destination::{DestinationId, DestinationProfile};
use crate::domain::entities::proxy::{Proxy, ProxyEndpoint};
use crate::domain::entities::trade::Trade;
use crate::domain::errors::{MarketDataError, SchedulerError};
use crate::domain::repositories::exchange_adapter::ExchangeAdapter;
use crate::domain::services::call_cache::{CacheStats, CallArg, CallKey, CallResultCache, CallValue};
use crate::domain::services::proxy_pool::ProxyPool;
use crate::domain::services::proxy_scheduler::ProxyScheduler;
use crate::domain::value_objects::market::{Depth, Ticker};
use crate::domain::value_objects::pair::Pair;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::timestamp::TimestampMicros;
use crate::infrastructure::proxy_import::{parse_proxy_list, ImportOutcome};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const OP_DEPTH: &str = "depth";
const OP_TICKER: &str = "ticker";

struct Registered {
    adapter: Arc<dyn ExchangeAdapter>,
    profile: DestinationProfile,
}

/// Cross-destination view of one pair, built from whichever destinations
/// answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSummary {
    pub best_bid: Price,
    pub best_ask: Price,
    /// Mean of last-trade prices across responding destinations.
    pub last_mean: f64,
    /// Summed volume across responding destinations.
    pub volume: f64,
    /// Destinations that contributed, sorted by id.
    pub destinations: Vec<DestinationId>,
}

impl TickerSummary {
    fn from_tickers(tickers: &HashMap<DestinationId, Ticker>) -> Option<TickerSummary> {
        let count = tickers.len() as f64;
        let mut values = tickers.values();
        let first = values.next()?;

        let mut best_bid = first.bid;
        let mut best_ask = first.ask;
        let mut last_sum = first.last.value();
        let mut volume = first.volume;
        for ticker in values {
            if ticker.bid > best_bid {
                best_bid = ticker.bid;
            }
            if ticker.ask < best_ask {
                best_ask = ticker.ask;
            }
            last_sum += ticker.last.value();
            volume += ticker.volume;
        }

        let mut destinations: Vec<DestinationId> = tickers.keys().cloned().collect();
        destinations.sort();

        Some(TickerSummary {
            best_bid,
            best_ask,
            last_mean: last_sum / count,
            volume,
            destinations,
        })
    }
}

/// The gateway facade. Owns the call cache, the trade history and the
/// proxy machinery; shared behind an `Arc` by everything that reads
/// market data.
pub struct MarketDataService {
    destinations: RwLock<HashMap<DestinationId, Registered>>,
    call_cache: Mutex<CallResultCache>,
    trade_history: TradeHistoryCache,
    pool: Arc<ProxyPool>,
    scheduler: Arc<ProxyScheduler>,
}

impl MarketDataService {
    pub fn new(config: &GatewayConfig) -> Self {
        let pool = Arc::new(ProxyPool::new());
        let scheduler = Arc::new(ProxyScheduler::new(pool.clone()));
        MarketDataService {
            destinations: RwLock::new(HashMap::new()),
            call_cache: Mutex::new(CallResultCache::new(config.call_cache_capacity)),
            trade_history: TradeHistoryCache::new(config),
            pool,
            scheduler,
        }
    }

    /// Register a destination through its adapter. The adapter's profile
    /// is snapshotted here; later profile changes are not observed.
    pub async fn register_destination(&self, adapter: Arc<dyn ExchangeAdapter>) -> DestinationProfile {
        let profile = adapter.profile();
        let mut destinations = self.destinations.write().await;
        self.scheduler.register_destination(&profile);
        let replaced = destinations
            .insert(
                profile.id.clone(),
                Registered {
                    adapter,
                    profile: profile.clone(),
                },
            )
            .is_some();
        if replaced {
            warn!(destination = %profile.id, "Destination re-registered, adapter replaced");
        } else {
            info!(
                destination = %profile.id,
                update_interval_ms = profile.update_interval.as_millis(),
                "Destination registered"
            );
        }
        profile
    }

    /// Drop a destination: its scheduler lane, its trade subscriptions and
    /// its cached call results all go with it.
    pub async fn deregister_destination(&self, destination: &DestinationId) -> bool {
        let removed = self.destinations.write().await.remove(destination).is_some();
        if !removed {
            return false;
        }
        self.scheduler.forget_destination(destination);
        let stopped = self.trade_history.stop_destination(destination).await;
        let invalidated = { self.call_cache.lock().await.invalidate_destination(destination) };
        info!(
            destination = %destination,
            stopped_subscriptions = stopped,
            invalidated_entries = invalidated,
            "Destination deregistered"
        );
        true
    }

    pub async fn destination_ids(&self) -> Vec<DestinationId> {
        let mut ids: Vec<DestinationId> = self.destinations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Add a proxy to the pool and to every destination lane.
    pub fn register_proxy(&self, endpoint: ProxyEndpoint) -> Arc<Proxy> {
        let proxy = self.pool.register(endpoint.kind, endpoint.addr);
        self.scheduler.admit_proxy(&proxy);
        proxy
    }

    /// Remove a proxy from the pool. Lanes shed their copies lazily, so
    /// the endpoint stops being recommended but an in-flight handle stays
    /// usable.
    pub fn deregister_proxy(&self, endpoint: &ProxyEndpoint) -> bool {
        match self.pool.deregister(endpoint) {
            Some(proxy) => {
                proxy.deactivate();
                true
            }
            None => false,
        }
    }

    /// Parse a proxy list and register every valid row.
    pub fn import_proxies(&self, text: &str) -> ImportOutcome {
        let outcome = parse_proxy_list(text);
        for endpoint in &outcome.imported {
            self.register_proxy(*endpoint);
        }
        info!(
            imported = outcome.imported.len(),
            skipped = outcome.skipped,
            pool_size = self.pool.len(),
            "Proxy list imported"
        );
        outcome
    }

    /// Pick the proxy to use for the next request to a destination.
    pub fn recommend_proxy(&self, destination: &DestinationId) -> Result<Arc<Proxy>, SchedulerError> {
        self.scheduler.recommend(destination)
    }

    pub fn pool(&self) -> Arc<ProxyPool> {
        self.pool.clone()
    }

    pub fn trade_history(&self) -> &TradeHistoryCache {
        &self.trade_history
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.call_cache.lock().await.stats()
    }

    /// Begin polling trades for a (destination, pair). Returns false when
    /// already active.
    pub async fn enable_trade_history(
        &self,
        destination: &DestinationId,
        pair: Pair,
    ) -> Result<bool, MarketDataError> {
        let (adapter, profile) = self.lookup(destination).await?;
        Ok(self.trade_history.start(&profile, pair, adapter).await)
    }

    /// Stop polling trades for a (destination, pair). Returns false when
    /// nothing was active.
    pub async fn disable_trade_history(&self, destination: &DestinationId, pair: &Pair) -> bool {
        self.trade_history.stop(destination, pair).await
    }

    /// Order book for a pair, served from cache within the destination's
    /// update interval.
    pub async fn depth(&self, destination: &DestinationId, pair: &Pair) -> Result<Depth, MarketDataError> {
        let (adapter, profile) = self.lookup(destination).await?;
        let key = CallKey::new(destination.clone(), OP_DEPTH, vec![CallArg::Pair(pair.clone())]);

        if let Some(CallValue::Depth(depth)) = self.cached(&key).await {
            return Ok(depth);
        }

        let depth = adapter
            .depth(pair)
            .await
            .map_err(|e| MarketDataError::data_not_available(destination, e))?;
        self.store(key, CallValue::Depth(depth.clone()), profile.update_interval)
            .await;
        Ok(depth)
    }

    /// Top-of-book ticker for a pair, served from cache within the
    /// destination's update interval.
    pub async fn ticker(&self, destination: &DestinationId, pair: &Pair) -> Result<Ticker, MarketDataError> {
        let (adapter, profile) = self.lookup(destination).await?;
        let key = CallKey::new(destination.clone(), OP_TICKER, vec![CallArg::Pair(pair.clone())]);

        if let Some(CallValue::Ticker(ticker)) = self.cached(&key).await {
            return Ok(ticker);
        }

        let ticker = adapter
            .ticker(pair)
            .await
            .map_err(|e| MarketDataError::data_not_available(destination, e))?;
        self.store(key, CallValue::Ticker(ticker), profile.update_interval)
            .await;
        Ok(ticker)
    }

    /// Best ask minus best bid, from the same cached book `depth` serves.
    pub async fn spread(&self, destination: &DestinationId, pair: &Pair) -> Result<f64, MarketDataError> {
        let depth = self.depth(destination, pair).await?;
        depth.spread().ok_or_else(|| {
            MarketDataError::data_not_available(destination, "order book empty on at least one side")
        })
    }

    /// Trades within `[start, end]`. Served from the history window when
    /// it covers the range; otherwise fetched directly and not cached,
    /// since arbitrary ranges would poison the polled window.
    pub async fn trades(
        &self,
        destination: &DestinationId,
        pair: &Pair,
        start: TimestampMicros,
        end: TimestampMicros,
    ) -> Result<Vec<Trade>, MarketDataError> {
        if self.trade_history.covers(destination, pair, start, end).await {
            if let Some(trades) = self
                .trade_history
                .trades_between(destination, pair, start, end)
                .await
            {
                debug!(
                    destination = %destination,
                    pair = %pair,
                    trades = trades.len(),
                    "Trade query served from history window"
                );
                return Ok(trades);
            }
        }

        let (adapter, _) = self.lookup(destination).await?;
        let batch = adapter
            .trades(pair, start)
            .await
            .map_err(|e| MarketDataError::data_not_available(destination, e))?;
        let trades: Vec<Trade> = batch
            .into_iter()
            .filter(|t| t.executed_at >= start && t.executed_at <= end)
            .collect();
        debug!(
            destination = %destination,
            pair = %pair,
            trades = trades.len(),
            "Trade query served directly, bypassing caches"
        );
        Ok(trades)
    }

    /// Ticker for one pair from every registered destination. Failing
    /// destinations are logged and skipped, never fatal to the collection.
    pub async fn collect_tickers(&self, pair: &Pair) -> HashMap<DestinationId, Ticker> {
        let ids: Vec<DestinationId> = { self.destinations.read().await.keys().cloned().collect() };

        let fetches = ids.into_iter().map(|id| async move {
            let result = self.ticker(&id, pair).await;
            (id, result)
        });

        let mut tickers = HashMap::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(ticker) => {
                    tickers.insert(id, ticker);
                }
                Err(e) => {
                    warn!(
                        destination = %id,
                        pair = %pair,
                        error = %e,
                        "Ticker collection skipping destination"
                    );
                }
            }
        }
        tickers
    }

    /// Aggregate view of one pair across all destinations that answered.
    pub async fn ticker_summary(&self, pair: &Pair) -> Result<TickerSummary, MarketDataError> {
        let tickers = self.collect_tickers(pair).await;
        TickerSummary::from_tickers(&tickers).ok_or_else(|| {
            MarketDataError::data_not_available("*", format!("no destination returned a ticker for {}", pair))
        })
    }

    /// Stop all background work and drop cached results.
    pub async fn shutdown(&self) {
        let stopped = self.trade_history.stop_all().await;
        self.call_cache.lock().await.clear();
        info!(stopped_subscriptions = stopped, "Market data service shut down");
    }

    async fn lookup(
        &self,
        destination: &DestinationId,
    ) -> Result<(Arc<dyn ExchangeAdapter>, DestinationProfile), MarketDataError> {
        let destinations = self.destinations.read().await;
        destinations
            .get(destination)
            .map(|r| (r.adapter.clone(), r.profile.clone()))
            .ok_or_else(|| MarketDataError::UnknownDestination {
                destination: destination.to_string(),
            })
    }

    // The cache lock is scoped to these two helpers so it is never held
    // across an adapter await.
    async fn cached(&self, key: &CallKey) -> Option<CallValue> {
        self.call_cache.lock().await.lookup(key)
    }

    async fn store(&self, key: CallKey, value: CallValue, ttl: Duration) {
        self.call_cache.lock().await.store(key, value, ttl);
    }
}
