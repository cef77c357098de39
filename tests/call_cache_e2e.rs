use async_trait::async_trait;
use soko::application::services::market_data::MarketDataService;
use soko::config::GatewayConfig;
use soko::domain::entities::destination::DestinationProfile;
use soko::domain::entities::trade::Trade;
use soko::domain::errors::MarketDataError;
use soko::domain::repositories::exchange_adapter::{AdapterError, AdapterResult, ExchangeAdapter};
use soko::domain::value_objects::amount::Amount;
use soko::domain::value_objects::market::{Depth, DepthLevel, Ticker};
use soko::domain::value_objects::pair::Pair;
use soko::domain::value_objects::price::Price;
use soko::domain::value_objects::timestamp::TimestampMicros;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn level(price: f64, amount: f64) -> DepthLevel {
    DepthLevel {
        price: Price::new(price).unwrap(),
        amount: Amount::new(amount).unwrap(),
    }
}

/// Adapter that counts every call it receives, so tests can tell whether
/// a read was answered from cache or refetched.
struct CountingAdapter {
    profile: DestinationProfile,
    depth_calls: AtomicUsize,
    ticker_calls: AtomicUsize,
    fail: AtomicBool,
    asks_empty: bool,
}

impl CountingAdapter {
    fn new(id: &str, update_interval: Duration) -> Self {
        CountingAdapter {
            profile: DestinationProfile::new(id, update_interval),
            depth_calls: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            asks_empty: false,
        }
    }
}

#[async_trait]
impl ExchangeAdapter for CountingAdapter {
    fn profile(&self) -> DestinationProfile {
        self.profile.clone()
    }

    async fn depth(&self, _pair: &Pair) -> AdapterResult<Depth> {
        self.depth_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AdapterError::Http(502));
        }
        let asks = if self.asks_empty {
            vec![]
        } else {
            vec![level(100.5, 0.7)]
        };
        Ok(Depth::new(vec![level(99.5, 1.2)], asks))
    }

    async fn ticker(&self, _pair: &Pair) -> AdapterResult<Ticker> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AdapterError::Network("connection reset".to_string()));
        }
        Ok(Ticker {
            bid: Price::new(99.5).unwrap(),
            ask: Price::new(100.5).unwrap(),
            last: Price::new(100.0).unwrap(),
            volume: 42.0,
        })
    }

    async fn trades(&self, _pair: &Pair, _since: TimestampMicros) -> AdapterResult<Vec<Trade>> {
        Ok(Vec::new())
    }
}

fn pair() -> Pair {
    Pair::parse("BTC-USD").unwrap()
}

#[tokio::test]
async fn test_cached_depth_expires_with_the_update_interval() {
    let service = MarketDataService::new(&GatewayConfig::default());
    let adapter = Arc::new(CountingAdapter::new("kraken", Duration::from_millis(150)));
    let profile = service.register_destination(adapter.clone()).await;

    // First read goes to the adapter, second is served from cache.
    let first = service.depth(&profile.id, &pair()).await.unwrap();
    let second = service.depth(&profile.id, &pair()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(adapter.depth_calls.load(Ordering::SeqCst), 1);

    // Past the update interval the entry is stale and must be refetched.
    tokio::time::sleep(Duration::from_millis(250)).await;
    service.depth(&profile.id, &pair()).await.unwrap();
    assert_eq!(adapter.depth_calls.load(Ordering::SeqCst), 2);

    let stats = service.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert!(stats.evictions >= 1, "stale entry should count as eviction");
}

#[tokio::test]
async fn test_operations_and_pairs_cache_independently() {
    let service = MarketDataService::new(&GatewayConfig::default());
    let adapter = Arc::new(CountingAdapter::new("kraken", Duration::from_secs(60)));
    let profile = service.register_destination(adapter.clone()).await;

    let btc = pair();
    let eth = Pair::parse("ETH-USD").unwrap();

    service.depth(&profile.id, &btc).await.unwrap();
    service.ticker(&profile.id, &btc).await.unwrap();
    service.depth(&profile.id, &eth).await.unwrap();

    // Same keys again: everything cached, no new adapter calls.
    service.depth(&profile.id, &btc).await.unwrap();
    service.ticker(&profile.id, &btc).await.unwrap();
    service.depth(&profile.id, &eth).await.unwrap();

    assert_eq!(adapter.depth_calls.load(Ordering::SeqCst), 2);
    assert_eq!(adapter.ticker_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_spread_reads_through_the_depth_cache() {
    let service = MarketDataService::new(&GatewayConfig::default());
    let adapter = Arc::new(CountingAdapter::new("kraken", Duration::from_secs(60)));
    let profile = service.register_destination(adapter.clone()).await;

    let spread = service.spread(&profile.id, &pair()).await.unwrap();
    assert!((spread - 1.0).abs() < f64::EPSILON);

    // depth and a second spread ride the same cached book.
    service.depth(&profile.id, &pair()).await.unwrap();
    service.spread(&profile.id, &pair()).await.unwrap();
    assert_eq!(adapter.depth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_spread_with_empty_ask_side_is_unavailable() {
    let service = MarketDataService::new(&GatewayConfig::default());
    let mut adapter = CountingAdapter::new("thin-venue", Duration::from_secs(60));
    adapter.asks_empty = true;
    let profile = service.register_destination(Arc::new(adapter)).await;

    let err = service.spread(&profile.id, &pair()).await.unwrap_err();
    match err {
        MarketDataError::DataNotAvailable { destination, detail } => {
            assert_eq!(destination, "thin-venue");
            assert!(detail.contains("order book"), "unexpected detail: {}", detail);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let service = MarketDataService::new(&GatewayConfig::default());
    let adapter = Arc::new(CountingAdapter::new("kraken", Duration::from_secs(60)));
    adapter.fail.store(true, Ordering::SeqCst);
    let profile = service.register_destination(adapter.clone()).await;

    // Two failing reads both reach the adapter: errors never enter the
    // cache, and the gateway does not retry on its own either.
    assert!(service.depth(&profile.id, &pair()).await.is_err());
    assert!(service.depth(&profile.id, &pair()).await.is_err());
    assert_eq!(adapter.depth_calls.load(Ordering::SeqCst), 2);

    // Once the destination recovers the next read is cached again.
    adapter.fail.store(false, Ordering::SeqCst);
    service.depth(&profile.id, &pair()).await.unwrap();
    service.depth(&profile.id, &pair()).await.unwrap();
    assert_eq!(adapter.depth_calls.load(Ordering::SeqCst), 3);
}
