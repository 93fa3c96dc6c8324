// src/health/mod.rs

//! Health monitor support: the probe policy, a pure model of the host's
//! monitor, and the HTTP probe used by `stagehand probe`.

pub mod monitor;
pub mod policy;
pub mod probe;

pub use monitor::{HealthStatus, ProbeTracker};
pub use policy::HealthCheckConfig;
pub use probe::{probe_once, watch, watch_with};
