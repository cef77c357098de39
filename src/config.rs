use std::time::Duration;

/// Runtime tuning for the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub trade_retention: Duration,       // How long trades stay in a history window
    pub trade_backfill: Duration,        // How far the first trade fetch reaches back
    pub poll_safety_margin: Duration,    // Added to update_interval between trade polls
    pub call_cache_capacity: usize,      // Max cached call results (LRU), must be non-zero
    pub health_sweep_interval: Duration, // Pause between proxy health sweeps
    pub probe_rate_per_sec: u32,         // Probe pacing within a sweep, must be non-zero
    pub probe_url: String,               // Target fetched through each proxy when probing
    pub egress_timeout: Duration,        // Per-request timeout for outbound HTTP
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            trade_retention: Duration::from_secs(24 * 60 * 60),
            trade_backfill: Duration::from_secs(60 * 60),
            poll_safety_margin: Duration::from_millis(100),
            call_cache_capacity: 1024,
            health_sweep_interval: Duration::from_secs(300),
            probe_rate_per_sec: 5,
            probe_url: "https://api.ipify.org".to_string(),
            egress_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables, falling back to the
    /// default for anything unset or out of range.
    pub fn from_env() -> GatewayConfig {
        dotenvy::dotenv().ok();
        let mut config = GatewayConfig::default();

        if let Ok(retention) = std::env::var("SOKO_TRADE_RETENTION_SECS") {
            match retention.parse::<u64>() {
                Ok(value) if (60..=604_800).contains(&value) => {
                    config.trade_retention = Duration::from_secs(value);
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid SOKO_TRADE_RETENTION_SECS value: {} (must be between 60 and 604800), using default: {}s",
                        value,
                        config.trade_retention.as_secs()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SOKO_TRADE_RETENTION_SECS '{}': {}, using default: {}s",
                        retention,
                        e,
                        config.trade_retention.as_secs()
                    );
                }
            }
        }

        if let Ok(backfill) = std::env::var("SOKO_TRADE_BACKFILL_SECS") {
            if let Ok(value) = backfill.parse::<u64>() {
                if (1..=86_400).contains(&value) {
                    config.trade_backfill = Duration::from_secs(value);
                } else {
                    tracing::warn!(
                        "SOKO_TRADE_BACKFILL_SECS out of range: {}, using default: {}s",
                        value,
                        config.trade_backfill.as_secs()
                    );
                }
            }
        }

        if let Ok(margin) = std::env::var("SOKO_POLL_SAFETY_MARGIN_MS") {
            if let Ok(value) = margin.parse::<u64>() {
                if value <= 10_000 {
                    config.poll_safety_margin = Duration::from_millis(value);
                }
            }
        }

        if let Ok(capacity) = std::env::var("SOKO_CALL_CACHE_CAPACITY") {
            if let Ok(value) = capacity.parse::<usize>() {
                if value >= 1 && value <= 1_000_000 {
                    config.call_cache_capacity = value;
                } else {
                    tracing::warn!(
                        "SOKO_CALL_CACHE_CAPACITY out of range: {}, using default: {}",
                        value,
                        config.call_cache_capacity
                    );
                }
            }
        }

        if let Ok(interval) = std::env::var("SOKO_HEALTH_SWEEP_INTERVAL_SECS") {
            if let Ok(value) = interval.parse::<u64>() {
                if (5..=86_400).contains(&value) {
                    config.health_sweep_interval = Duration::from_secs(value);
                }
            }
        }

        if let Ok(rate) = std::env::var("SOKO_PROBE_RATE_PER_SEC") {
            if let Ok(value) = rate.parse::<u32>() {
                if (1..=1_000).contains(&value) {
                    config.probe_rate_per_sec = value;
                }
            }
        }

        if let Ok(url) = std::env::var("SOKO_PROBE_URL") {
            if !url.trim().is_empty() {
                config.probe_url = url;
            }
        }

        if let Ok(timeout) = std::env::var("SOKO_EGRESS_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                if (100..=120_000).contains(&value) {
                    config.egress_timeout = Duration::from_millis(value);
                }
            }
        }

        config
    }
}
