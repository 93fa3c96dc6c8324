// src/supervisor/mod.rs

//! Server supervision.
//!
//! The [`Supervisor`] owns exactly one server process. It is the IO shell
//! around [`SupervisorCore`]: it reads [`SupervisorEvent`]s from signals,
//! the child's exit, the grace timer and the health endpoint, feeds them to
//! the core, and executes the [`SupervisorAction`]s that come back.

pub mod health;
pub mod process;
pub mod state;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use nix::sys::signal::Signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigFile, HealthSettings, ShutdownSettings, format_duration};
use crate::errors::RunError;

pub use health::HealthProxy;
pub use process::{ServerCommand, ServerProcess};
pub use state::{RunOutcome, ServerState, SupervisorAction, SupervisorCore, SupervisorEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The parts of the configuration the run phase needs.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub port: u16,
    pub bind_timeout: Duration,
    pub shutdown: ShutdownSettings,
    pub health: HealthSettings,
}

impl SupervisorSettings {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            port: cfg.run.port,
            bind_timeout: cfg.run.bind_timeout,
            shutdown: cfg.shutdown,
            health: cfg.health.clone(),
        }
    }

    /// URL of the server's own health route.
    pub fn upstream_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, self.health.upstream_path)
    }
}

/// Cheap handle for talking to a running supervisor from other tasks.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    events: mpsc::Sender<SupervisorEvent>,
    state: watch::Receiver<ServerState>,
}

impl SupervisorHandle {
    /// Ask the supervisor to stop the server. Returns `false` once the
    /// supervisor is gone.
    pub async fn request_termination(&self) -> bool {
        self.events
            .send(SupervisorEvent::TerminationRequested)
            .await
            .is_ok()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Wait until the published state equals `want`.
    pub async fn wait_for_state(&self, want: ServerState) -> bool {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == want).await.is_ok()
    }
}

pub struct Supervisor {
    settings: SupervisorSettings,
    core: SupervisorCore,
    server: Option<ServerProcess>,
    state_tx: watch::Sender<ServerState>,
    events_tx: mpsc::Sender<SupervisorEvent>,
    events_rx: mpsc::Receiver<SupervisorEvent>,
    /// Events received while `launch` was still waiting for the bind.
    pending: VecDeque<SupervisorEvent>,
    client: reqwest::Client,
    health_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings) -> Result<Self, RunError> {
        let (state_tx, _) = watch::channel(ServerState::Starting);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = reqwest::Client::builder()
            .build()
            .context("building health probe client")?;
        let core = SupervisorCore::new(settings.shutdown.mode, settings.shutdown.grace_period);

        Ok(Self {
            settings,
            core,
            server: None,
            state_tx,
            events_tx,
            events_rx,
            pending: VecDeque::new(),
            client,
            health_task: None,
        })
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            events: self.events_tx.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state_tx.borrow()
    }

    /// The health endpoint router, wired to this supervisor.
    pub fn health_router(&self) -> axum::Router {
        health::router(
            &self.settings.health.policy.path,
            HealthProxy {
                state: self.state_tx.subscribe(),
                events: self.events_tx.clone(),
                upstream: self.settings.upstream_url(),
                timeout: self.settings.health.policy.timeout,
                client: self.client.clone(),
            },
        )
    }

    /// Bind `[health].listen` and serve the health endpoint in the background.
    pub async fn start_health_listener(&mut self) -> Result<SocketAddr, RunError> {
        let addr = self.settings.health.listen;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RunError::HealthListener {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let bound = listener.local_addr().map_err(|e| RunError::HealthListener {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        let app = self.health_router();
        self.health_task = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "health endpoint stopped");
            }
        }));

        info!(
            addr = %bound,
            path = %self.settings.health.policy.path,
            upstream = %self.settings.upstream_url(),
            "health endpoint listening"
        );
        Ok(bound)
    }

    /// Resolve once a termination request arrives while no server is
    /// running. Other events are dropped.
    pub async fn termination_requested(&mut self) {
        while let Some(event) = self.events_rx.recv().await {
            if event == SupervisorEvent::TerminationRequested {
                return;
            }
            debug!(?event, "ignoring event before launch");
        }
    }

    /// Give up before launching: probes fail from now on.
    pub fn abandon(&mut self) {
        self.publish(ServerState::Stopped);
    }

    /// Start the server and wait until it accepts connections on its port.
    ///
    /// Returns the server's pid. A termination request that arrives during
    /// the wait cuts it short; `run` then handles the request first.
    pub async fn launch(&mut self, command: &ServerCommand) -> Result<u32, RunError> {
        if let Some(server) = &self.server {
            return Err(RunError::AlreadyRunning { pid: server.pid() });
        }

        self.core = SupervisorCore::new(
            self.settings.shutdown.mode,
            self.settings.shutdown.grace_period,
        );
        self.pending.clear();
        self.publish(ServerState::Starting);

        let mut server = match ServerProcess::spawn(command) {
            Ok(server) => server,
            Err(e) => {
                self.publish(ServerState::Stopped);
                return Err(e);
            }
        };

        let port = self.settings.port;
        let limit = self.settings.bind_timeout;
        let bound = {
            let bind = server.wait_for_bind(port, limit);
            tokio::pin!(bind);
            loop {
                tokio::select! {
                    res = &mut bind => break res,
                    Some(event) = self.events_rx.recv() => {
                        let stop = event == SupervisorEvent::TerminationRequested;
                        self.pending.push_back(event);
                        if stop {
                            info!(port, "termination requested before the server bound its port");
                            break Ok(());
                        }
                    }
                }
            }
        };

        if let Err(e) = bound {
            if let Err(kill_err) = server.signal(Signal::SIGKILL) {
                warn!(error = %kill_err, "failed to kill server after failed start");
            }
            if !matches!(e, RunError::ExitedBeforeBind { .. }) {
                let _ = server.wait().await;
            }
            self.publish(ServerState::Stopped);
            return Err(e);
        }

        let pid = server.pid();
        self.server = Some(server);
        Ok(pid)
    }

    /// Supervise the launched server until it stops.
    pub async fn run(&mut self) -> Result<RunOutcome, RunError> {
        let mut server = self.server.take().ok_or(RunError::NotLaunched)?;
        let pid = server.pid();
        let mut grace: Option<Pin<Box<Sleep>>> = None;

        loop {
            let event = match self.pending.pop_front() {
                Some(event) => event,
                None => tokio::select! {
                    code = server.wait() => SupervisorEvent::ChildExited { code: code? },
                    Some(event) = self.events_rx.recv() => event,
                    _ = grace_elapsed(&mut grace) => SupervisorEvent::GraceExpired,
                },
            };

            match event {
                SupervisorEvent::GraceExpired => {
                    grace = None;
                    warn!(
                        pid,
                        grace_period = %format_duration(self.settings.shutdown.grace_period),
                        "server did not exit within the grace period"
                    );
                }
                SupervisorEvent::ChildExited { code } => {
                    info!(pid, ?code, state = %self.core.state(), "server process exited");
                }
                _ => debug!(?event, state = %self.core.state(), "supervisor event"),
            }

            for action in self.core.step(event) {
                match action {
                    SupervisorAction::Publish(state) => self.publish(state),
                    SupervisorAction::SendGraceful => {
                        info!(pid, "forwarding SIGTERM to server process group");
                        server.signal(Signal::SIGTERM)?;
                    }
                    SupervisorAction::ForceKill => {
                        warn!(pid, "sending SIGKILL to server process group");
                        server.signal(Signal::SIGKILL)?;
                    }
                    SupervisorAction::ArmGraceTimer(after) => {
                        grace = Some(Box::pin(tokio::time::sleep(after)));
                    }
                    SupervisorAction::Finish(outcome) => {
                        let deadline = grace.as_ref().map(|sleep| sleep.deadline());
                        let outcome = clear_group(&server, outcome, deadline).await?;
                        info!(pid, ?outcome, exit_code = outcome.exit_code(), "supervision finished");
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    fn publish(&self, state: ServerState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(state = %state, "server state: {previous} -> {state}");
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(task) = self.health_task.take() {
            task.abort();
        }
    }
}

/// Make sure nothing is left in the server's process group once the leader
/// is gone.
///
/// After a graceful exit the remaining workers get the rest of the grace
/// period; whatever is still alive then is killed and the outcome becomes
/// [`RunOutcome::Forced`]. Workers left behind by a server that stopped on
/// its own are killed straight away.
async fn clear_group(
    server: &ServerProcess,
    outcome: RunOutcome,
    grace_deadline: Option<Instant>,
) -> Result<RunOutcome, RunError> {
    let pid = server.pid();
    if !server.group_alive() {
        return Ok(outcome);
    }

    if let (RunOutcome::Graceful { .. }, Some(deadline)) = (outcome, grace_deadline) {
        debug!(pid, "server exited; waiting for the rest of its process group");
        while server.group_alive() && Instant::now() < deadline {
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }
        if !server.group_alive() {
            return Ok(outcome);
        }
        warn!(pid, "server workers did not exit within the grace period; sending SIGKILL");
        server.signal(Signal::SIGKILL)?;
        return Ok(RunOutcome::Forced);
    }

    warn!(pid, ?outcome, "killing processes left in the server's process group");
    server.signal(Signal::SIGKILL)?;
    Ok(outcome)
}

async fn grace_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Forward SIGTERM and SIGINT to the supervisor as termination requests.
pub fn spawn_signal_listener(handle: SupervisorHandle) -> Result<JoinHandle<()>, RunError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = term.recv() => "SIGTERM",
                Some(()) = int.recv() => "SIGINT",
                else => break,
            };
            info!(signal = name, "termination requested");
            if !handle.request_termination().await {
                break;
            }
        }
    }))
}
