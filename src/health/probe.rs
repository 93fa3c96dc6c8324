// src/health/probe.rs

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::health::{HealthCheckConfig, HealthStatus, ProbeTracker};

/// One HTTP GET against `url`; success iff a 2xx arrives within `timeout`.
pub async fn probe_once(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    match client.get(url).timeout(timeout).send().await {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            debug!(url, status = %resp.status(), "probe answered with failure status");
            false
        }
        Err(e) => {
            debug!(url, error = %e, "probe request failed");
            false
        }
    }
}

/// Run the host monitor loop against `url` until the container is unhealthy.
pub async fn watch(client: &reqwest::Client, url: &str, policy: &HealthCheckConfig) -> HealthStatus {
    watch_with(policy, || probe_once(client, url, policy.timeout)).await
}

/// Monitor loop over an arbitrary probe: wait one interval, probe, record.
///
/// Returns only once the tracker reports [`HealthStatus::Unhealthy`].
pub async fn watch_with<F, Fut>(policy: &HealthCheckConfig, mut probe: F) -> HealthStatus
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    let mut tracker = ProbeTracker::new(policy);

    loop {
        tokio::time::sleep(policy.interval).await;
        let ok = probe().await;
        let before = tracker.status();
        let after = tracker.record(ok, started.elapsed());

        if before != after {
            match after {
                HealthStatus::Unhealthy => {
                    warn!(failures = tracker.failures(), "health: {before} -> {after}");
                }
                _ => info!("health: {before} -> {after}"),
            }
        } else if !ok {
            debug!(failures = tracker.failures(), status = %after, "probe failed");
        }

        if after == HealthStatus::Unhealthy {
            return after;
        }
    }
}
