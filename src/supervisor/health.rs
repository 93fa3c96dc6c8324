// src/supervisor/health.rs

//! The health endpoint the host's monitor probes.
//!
//! Probes are proxied to the server while it is starting or ready; the
//! first one that gets through moves the supervisor from `Starting` to
//! `Ready`. Once termination begins every probe fails.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::health::probe_once;
use crate::supervisor::state::{ServerState, SupervisorEvent};

#[derive(Debug, Clone)]
pub struct HealthProxy {
    pub state: watch::Receiver<ServerState>,
    pub events: mpsc::Sender<SupervisorEvent>,
    /// Full URL of the server's own health route.
    pub upstream: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

pub fn router(path: &str, proxy: HealthProxy) -> Router {
    Router::new()
        .route(path, routing::get(ping))
        .with_state(proxy)
}

async fn ping(State(proxy): State<HealthProxy>) -> (StatusCode, &'static str) {
    let before = *proxy.state.borrow();
    if !matches!(before, ServerState::Starting | ServerState::Ready) {
        return (StatusCode::SERVICE_UNAVAILABLE, before.as_str());
    }

    let ok = probe_once(&proxy.client, &proxy.upstream, proxy.timeout).await;

    // Termination may have started while the probe was in flight.
    let now = *proxy.state.borrow();
    if !ok || !matches!(now, ServerState::Starting | ServerState::Ready) {
        return (StatusCode::SERVICE_UNAVAILABLE, now.as_str());
    }

    if now == ServerState::Starting {
        debug!("first successful probe; reporting server ready");
        if proxy.events.send(SupervisorEvent::ProbeSucceeded).await.is_err() {
            return (StatusCode::SERVICE_UNAVAILABLE, ServerState::Stopped.as_str());
        }
    }
    (StatusCode::OK, ServerState::Ready.as_str())
}
