use crate::config::GatewayConfig;
use crate::domain::repositories::proxy_probe::ProxyProbe;
use crate::domain::services::proxy_pool::ProxyPool;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type ProbeLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Periodic probing of every pooled proxy.
///
/// Reachable proxies earn a rating point; a reachable proxy that was
/// deactivated is put back into rotation. Unreachable proxies lose a
/// point and eventually deactivate through the rating floor. Probes are
/// paced so a large pool does not burst the probe target.
pub struct ProxyHealthChecker {
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyHealthChecker {
    /// Start the sweep task. The first sweep runs immediately, then every
    /// `health_sweep_interval`.
    pub fn spawn(pool: Arc<ProxyPool>, probe: Arc<dyn ProxyProbe>, config: &GatewayConfig) -> Self {
        let token = CancellationToken::new();
        let sweep = HealthSweep {
            pool,
            probe,
            token: token.clone(),
            interval: config.health_sweep_interval,
            probe_rate_per_sec: config.probe_rate_per_sec,
        };
        let task = tokio::spawn(sweep.run());
        ProxyHealthChecker {
            token,
            task: Mutex::new(Some(task)),
        }
    }

    /// Cancel the sweep task and wait for it to finish. Idempotent.
    pub async fn stop(&self) {
        self.token.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Health checker task ended abnormally");
            }
        }
    }
}

struct HealthSweep {
    pool: Arc<ProxyPool>,
    probe: Arc<dyn ProxyProbe>,
    token: CancellationToken,
    interval: Duration,
    probe_rate_per_sec: u32,
}

impl HealthSweep {
    async fn run(self) {
        let limiter: ProbeLimiter = RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(self.probe_rate_per_sec).expect("Probe rate must be non-zero"),
        ));
        let mut ticker = tokio::time::interval(self.interval);
        info!(
            interval_secs = self.interval.as_secs(),
            probe_rate_per_sec = self.probe_rate_per_sec,
            "Proxy health checker started"
        );

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep(&limiter).await;
                }
            }
        }

        info!("Proxy health checker stopped");
    }

    async fn sweep(&self, limiter: &ProbeLimiter) {
        let proxies = self.pool.all_proxies();
        if proxies.is_empty() {
            debug!("No proxies registered, skipping health sweep");
            return;
        }

        debug!(proxies = proxies.len(), "Proxy health sweep started");
        let mut reachable = 0usize;
        let mut unreachable = 0usize;

        for proxy in proxies {
            if self.token.is_cancelled() {
                return;
            }
            limiter.until_ready().await;

            let report = self.probe.probe(proxy.endpoint()).await;
            if report.reachable {
                reachable += 1;
                if proxy.is_active() {
                    proxy.record_success();
                } else {
                    proxy.reactivate();
                    info!(proxy = %proxy.endpoint(), "Proxy reachable again, reactivated");
                }
                if let Some(latency) = report.latency {
                    debug!(
                        proxy = %proxy.endpoint(),
                        latency_ms = latency.as_millis(),
                        "Proxy probe succeeded"
                    );
                }
            } else {
                unreachable += 1;
                let rating = proxy.record_failure();
                warn!(proxy = %proxy.endpoint(), rating, "Proxy probe failed");
            }
        }

        info!(reachable, unreachable, "Proxy health sweep finished");
    }
}
