//! Gateway Tour
//!
//! Walks the market data gateway end to end against two simulated
//! destinations: proxy import and rotation, cached depth reads, spread,
//! cross-destination ticker summary and polled trade history. Everything
//! runs in-process, no network access needed.
//! Run with: cargo run --example gateway_tour

use async_trait::async_trait;
use soko::application::services::market_data::MarketDataService;
use soko::config::GatewayConfig;
use soko::domain::entities::destination::{DestinationId, DestinationProfile};
use soko::domain::entities::trade::{Trade, TradeSide};
use soko::domain::repositories::exchange_adapter::{AdapterResult, ExchangeAdapter};
use soko::domain::value_objects::amount::Amount;
use soko::domain::value_objects::market::{Depth, DepthLevel, Ticker};
use soko::domain::value_objects::pair::Pair;
use soko::domain::value_objects::price::Price;
use soko::domain::value_objects::timestamp::TimestampMicros;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process destination quoting around a fixed mid price. Stands in for
/// a real venue so the tour runs offline.
struct SimulatedVenue {
    profile: DestinationProfile,
    mid: f64,
    volume: f64,
    requests: AtomicUsize,
}

impl SimulatedVenue {
    fn new(id: &str, mid: f64, volume: f64) -> Self {
        SimulatedVenue {
            profile: DestinationProfile::new(id, Duration::from_millis(500))
                .with_min_request_interval(Duration::from_millis(400)),
            mid,
            volume,
            requests: AtomicUsize::new(0),
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn level(&self, price: f64, amount: f64) -> DepthLevel {
        DepthLevel {
            price: Price::new(price).expect("demo price is positive"),
            amount: Amount::new(amount).expect("demo amount is positive"),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedVenue {
    fn profile(&self) -> DestinationProfile {
        self.profile.clone()
    }

    async fn depth(&self, _pair: &Pair) -> AdapterResult<Depth> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(Depth::new(
            vec![self.level(self.mid - 0.5, 1.2), self.level(self.mid - 1.0, 3.0)],
            vec![self.level(self.mid + 0.5, 0.8), self.level(self.mid + 1.0, 2.5)],
        ))
    }

    async fn ticker(&self, _pair: &Pair) -> AdapterResult<Ticker> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(Ticker {
            bid: Price::new(self.mid - 0.5).expect("demo price is positive"),
            ask: Price::new(self.mid + 0.5).expect("demo price is positive"),
            last: Price::new(self.mid).expect("demo price is positive"),
            volume: self.volume,
        })
    }

    async fn trades(&self, _pair: &Pair, since: TimestampMicros) -> AdapterResult<Vec<Trade>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        // Replay one print per second from `since` up to just behind now,
        // the way a venue answers a backfill request.
        let ceiling = TimestampMicros::now() - Duration::from_millis(50);
        let mut batch = Vec::new();
        let mut at = since;
        while at <= ceiling {
            batch.push(Trade::new(
                at,
                format!("sim-{}", at.micros()),
                Price::new(self.mid).expect("demo price is positive"),
                Amount::new(0.1).expect("demo amount is positive"),
                TradeSide::Buy,
            ));
            at = at + Duration::from_secs(1);
        }
        Ok(batch)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        println!("⚠️  Could not load .env file: {}", e);
        println!("   Continuing with built-in defaults\n");
    }

    println!("🚀 Market data gateway tour (all destinations simulated in-process)\n");

    // Short backfill so the first trade poll stays small.
    let config = GatewayConfig {
        trade_backfill: Duration::from_secs(30),
        poll_safety_margin: Duration::from_millis(100),
        ..GatewayConfig::default()
    };
    let service = MarketDataService::new(&config);

    // Two venues quoting slightly different mids.
    let kraken = Arc::new(SimulatedVenue::new("sim-kraken", 64_000.0, 950.0));
    let bitstamp = Arc::new(SimulatedVenue::new("sim-bitstamp", 64_000.4, 1_250.0));
    let profile = service.register_destination(kraken.clone()).await;
    println!(
        "✅ Registered {} (update interval {:?}, proxy cool-down {:?})",
        profile.id, profile.update_interval, profile.min_request_interval
    );
    let profile = service.register_destination(bitstamp.clone()).await;
    println!(
        "✅ Registered {} (update interval {:?}, proxy cool-down {:?})\n",
        profile.id, profile.update_interval, profile.min_request_interval
    );

    // Proxy roster with one malformed row.
    println!("🌐 Importing proxy list...");
    let roster = "\
        10.0.0.1:1080;socks5\n\
        10.0.0.2:1080;socks5\n\
        10.0.0.3:8080;http\n\
        not-a-proxy\n";
    let outcome = service.import_proxies(roster);
    println!(
        "   {} imported, {} skipped\n",
        outcome.imported.len(),
        outcome.skipped
    );

    let dest = DestinationId::from("sim-kraken");
    println!("🔄 Proxy rotation for {}:", dest);
    for attempt in 1..=4 {
        match service.recommend_proxy(&dest) {
            Ok(proxy) => println!("   attempt {}: {}", attempt, proxy.endpoint()),
            Err(e) => println!("   attempt {}: {}", attempt, e),
        }
    }
    println!("   (fourth attempt reuses the least recently recommended proxy)\n");

    let pair = Pair::parse("BTC-USD")?;
    println!("📊 Depth for {} on {}:", pair, dest);
    let depth = service.depth(&dest, &pair).await?;
    println!(
        "   fresh read: {} bids / {} asks ({} adapter requests so far)",
        depth.bids.len(),
        depth.asks.len(),
        kraken.requests()
    );
    let _ = service.depth(&dest, &pair).await?;
    let stats = service.cache_stats().await;
    println!(
        "   repeat read served from cache: hits={} misses={} ({} adapter requests)",
        stats.hits,
        stats.misses,
        kraken.requests()
    );
    let spread = service.spread(&dest, &pair).await?;
    println!("   spread from the same cached book: {:.2}", spread);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let before = kraken.requests();
    let _ = service.depth(&dest, &pair).await?;
    println!(
        "   update interval elapsed, next read refreshed ({} -> {} adapter requests)\n",
        before,
        kraken.requests()
    );

    println!("🧮 Ticker summary for {} across destinations:", pair);
    let summary = service.ticker_summary(&pair).await?;
    println!(
        "   best bid {:.2}, best ask {:.2}, mean last {:.2}, total volume {:.1}",
        summary.best_bid.value(),
        summary.best_ask.value(),
        summary.last_mean,
        summary.volume
    );
    let contributors: Vec<&str> = summary.destinations.iter().map(|d| d.as_str()).collect();
    println!("   contributors: {:?}\n", contributors);

    println!("📈 Enabling trade history on {}...", dest);
    service.enable_trade_history(&dest, pair.clone()).await?;
    println!("   polling in the background; letting a few polls run");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let end = TimestampMicros::now() - Duration::from_secs(2);
    let start = end - Duration::from_secs(8);
    let covered = service.trades(&dest, &pair, start, end).await?;
    println!("   {} trades served from the polled window", covered.len());

    let wide_start = TimestampMicros::now() - Duration::from_secs(120);
    let wide = service
        .trades(&dest, &pair, wide_start, TimestampMicros::now())
        .await?;
    println!(
        "   {} trades fetched directly for a 120s range the window does not cover\n",
        wide.len()
    );

    println!("🛑 Shutting down...");
    service.shutdown().await;
    println!("✅ Tour complete");
    Ok(())
}
