// src/health/policy.rs

use std::time::Duration;

use crate::config::format_duration;

/// How the host's health monitor probes the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckConfig {
    /// HTTP path answered by the health endpoint.
    pub path: String,
    pub interval: Duration,
    /// Per-probe deadline.
    pub timeout: Duration,
    /// Failures during this window after start are not counted.
    pub start_period: Duration,
    /// Consecutive counted failures before the container is unhealthy.
    pub retries: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: "/ping".to_string(),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            start_period: Duration::from_secs(5),
            retries: 3,
        }
    }
}

impl HealthCheckConfig {
    /// The Dockerfile `HEALTHCHECK` instruction matching this policy.
    pub fn docker_healthcheck(&self, command: &str) -> String {
        format!(
            "HEALTHCHECK --interval={} --timeout={} --start-period={} --retries={} CMD {}",
            format_duration(self.interval),
            format_duration(self.timeout),
            format_duration(self.start_period),
            self.retries,
            command
        )
    }
}
