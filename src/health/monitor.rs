// src/health/monitor.rs

use std::fmt;
use std::time::Duration;

use crate::health::HealthCheckConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Starting,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Starting => "starting",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure model of the host's health monitor.
///
/// Probe results are fed in with the time elapsed since the container
/// started. No clock or IO lives here; the caller owns both.
#[derive(Debug, Clone)]
pub struct ProbeTracker {
    start_period: Duration,
    retries: u32,
    failures: u32,
    status: HealthStatus,
}

impl ProbeTracker {
    pub fn new(policy: &HealthCheckConfig) -> Self {
        Self {
            start_period: policy.start_period,
            retries: policy.retries.max(1),
            failures: 0,
            status: HealthStatus::Starting,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    /// Consecutive counted failures so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record one probe outcome and return the resulting status.
    pub fn record(&mut self, success: bool, since_start: Duration) -> HealthStatus {
        if success {
            self.failures = 0;
            self.status = HealthStatus::Healthy;
            return self.status;
        }

        if since_start < self.start_period {
            return self.status;
        }

        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.retries {
            self.status = HealthStatus::Unhealthy;
        }
        self.status
    }
}
