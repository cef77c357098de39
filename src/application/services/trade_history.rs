use crate::config::GatewayConfig;
use crate::domain::entities::destination::{DestinationId, DestinationProfile};
use crate::domain::entities::trade::Trade;
use crate::domain::repositories::exchange_adapter::ExchangeAdapter;
use crate::domain::services::trade_window::TradeWindow;
use crate::domain::value_objects::pair::Pair;
use crate::domain::value_objects::timestamp::TimestampMicros;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Allowance for venue clock skew. The fetch cursor always trails now by
/// this much so a trade stamped slightly in the past by the venue cannot
/// slip between two fetch ranges.
const CLOCK_SKEW_SLACK: Duration = Duration::from_secs(3);

struct Subscription {
    window: Arc<RwLock<TradeWindow>>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Rolling trade history, one background poller per activated
/// (destination, pair) subscription.
///
/// `start`/`stop` are idempotent: starting an active subscription is a
/// no-op, stopping an inactive one is a no-op. `stop` cancels the poller
/// cooperatively and waits for an in-flight iteration to finish, so a
/// window is never torn down mid-merge.
pub struct TradeHistoryCache {
    subscriptions: Mutex<HashMap<(DestinationId, Pair), Subscription>>,
    retention: Duration,
    backfill: Duration,
    safety_margin: Duration,
}

impl TradeHistoryCache {
    pub fn new(config: &GatewayConfig) -> Self {
        TradeHistoryCache {
            subscriptions: Mutex::new(HashMap::new()),
            retention: config.trade_retention,
            backfill: config.trade_backfill,
            safety_margin: config.poll_safety_margin,
        }
    }

    /// Activate polling for a (destination, pair). Returns false when a
    /// live subscription already exists. A subscription whose poller died
    /// is replaced.
    pub async fn start(
        &self,
        profile: &DestinationProfile,
        pair: Pair,
        adapter: Arc<dyn ExchangeAdapter>,
    ) -> bool {
        let key = (profile.id.clone(), pair.clone());
        let mut subscriptions = self.subscriptions.lock().await;
        if let Some(existing) = subscriptions.get(&key) {
            if !existing.task.is_finished() {
                debug!(
                    destination = %profile.id,
                    pair = %pair,
                    "Trade history subscription already active"
                );
                return false;
            }
        }

        let window = Arc::new(RwLock::new(TradeWindow::new()));
        let token = CancellationToken::new();
        let poller = TradePoller {
            destination: profile.id.clone(),
            pair: pair.clone(),
            adapter,
            window: window.clone(),
            token: token.clone(),
            poll_interval: profile.update_interval + self.safety_margin,
            retention: self.retention,
            backfill: self.backfill,
        };
        let task = tokio::spawn(poller.run());
        subscriptions.insert(key, Subscription { window, token, task });
        true
    }

    /// Deactivate one subscription, waiting for its poller to wind down.
    pub async fn stop(&self, destination: &DestinationId, pair: &Pair) -> bool {
        let key = (destination.clone(), pair.clone());
        let removed = { self.subscriptions.lock().await.remove(&key) };
        match removed {
            Some(subscription) => {
                Self::wind_down(destination, pair, subscription).await;
                true
            }
            None => {
                debug!(
                    destination = %destination,
                    pair = %pair,
                    "Trade history subscription already stopped"
                );
                false
            }
        }
    }

    /// Deactivate every subscription of one destination. Returns how many
    /// were stopped.
    pub async fn stop_destination(&self, destination: &DestinationId) -> usize {
        let drained: Vec<((DestinationId, Pair), Subscription)> = {
            let mut subscriptions = self.subscriptions.lock().await;
            let keys: Vec<(DestinationId, Pair)> = subscriptions
                .keys()
                .filter(|(d, _)| d == destination)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| subscriptions.remove(&key).map(|sub| (key, sub)))
                .collect()
        };

        let stopped = drained.len();
        for ((destination, pair), subscription) in drained {
            Self::wind_down(&destination, &pair, subscription).await;
        }
        stopped
    }

    /// Deactivate everything. For shutdown paths.
    pub async fn stop_all(&self) -> usize {
        let drained: Vec<((DestinationId, Pair), Subscription)> = {
            let mut subscriptions = self.subscriptions.lock().await;
            subscriptions.drain().collect()
        };

        let stopped = drained.len();
        for ((destination, pair), subscription) in drained {
            Self::wind_down(&destination, &pair, subscription).await;
        }
        stopped
    }

    async fn wind_down(destination: &DestinationId, pair: &Pair, subscription: Subscription) {
        subscription.token.cancel();
        if let Err(e) = subscription.task.await {
            warn!(
                destination = %destination,
                pair = %pair,
                error = %e,
                "Trade history poller ended abnormally"
            );
        }
        info!(
            destination = %destination,
            pair = %pair,
            "Trade history subscription stopped"
        );
    }

    pub async fn is_active(&self, destination: &DestinationId, pair: &Pair) -> bool {
        let subscriptions = self.subscriptions.lock().await;
        subscriptions
            .get(&(destination.clone(), pair.clone()))
            .map(|sub| !sub.task.is_finished())
            .unwrap_or(false)
    }

    pub async fn active_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Whether the cached window fully covers `[start, end]`.
    pub async fn covers(
        &self,
        destination: &DestinationId,
        pair: &Pair,
        start: TimestampMicros,
        end: TimestampMicros,
    ) -> bool {
        match self.window_of(destination, pair).await {
            Some(window) => window.read().await.contains(start, end),
            None => false,
        }
    }

    /// Cached trades within `[start, end]`, or None when no subscription
    /// exists for the key.
    pub async fn trades_between(
        &self,
        destination: &DestinationId,
        pair: &Pair,
        start: TimestampMicros,
        end: TimestampMicros,
    ) -> Option<Vec<Trade>> {
        match self.window_of(destination, pair).await {
            Some(window) => Some(window.read().await.trades_between(start, end)),
            None => None,
        }
    }

    async fn window_of(
        &self,
        destination: &DestinationId,
        pair: &Pair,
    ) -> Option<Arc<RwLock<TradeWindow>>> {
        // Clone the handle out so the subscription lock is never held
        // while waiting on a window lock.
        self.subscriptions
            .lock()
            .await
            .get(&(destination.clone(), pair.clone()))
            .map(|sub| sub.window.clone())
    }
}

/// Background poller for one subscription.
struct TradePoller {
    destination: DestinationId,
    pair: Pair,
    adapter: Arc<dyn ExchangeAdapter>,
    window: Arc<RwLock<TradeWindow>>,
    token: CancellationToken,
    poll_interval: Duration,
    retention: Duration,
    backfill: Duration,
}

impl TradePoller {
    async fn run(self) {
        let mut last_checked = TimestampMicros::now() - self.backfill - CLOCK_SKEW_SLACK;
        info!(
            destination = %self.destination,
            pair = %self.pair,
            poll_interval_ms = self.poll_interval.as_millis(),
            "Trade history poller started"
        );

        loop {
            if self.token.is_cancelled() {
                break;
            }

            match self.adapter.trades(&self.pair, last_checked).await {
                Ok(batch) => {
                    last_checked = TimestampMicros::now() - CLOCK_SKEW_SLACK;
                    let cutoff = TimestampMicros::now() - self.retention;
                    let fetched = batch.len();
                    let (appended, evicted, window_len) = {
                        let mut window = self.window.write().await;
                        let appended = window.merge(batch);
                        let evicted = window.evict_older_than(cutoff);
                        (appended, evicted, window.len())
                    };
                    debug!(
                        destination = %self.destination,
                        pair = %self.pair,
                        fetched,
                        appended,
                        evicted,
                        window_len,
                        "Trade history window updated"
                    );
                }
                Err(e) => {
                    // Advance the cursor anyway so a destination that keeps
                    // failing cannot pin the fetch range ever further into
                    // the past.
                    last_checked = TimestampMicros::now() - CLOCK_SKEW_SLACK;
                    warn!(
                        destination = %self.destination,
                        pair = %self.pair,
                        error = %e,
                        "Trade fetch failed, window left untouched"
                    );
                }
            }

            tokio::select! {
                _ = self.token.cancelled() => {
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(
            destination = %self.destination,
            pair = %self.pair,
            "Trade history poller stopped"
        );
    }
}
