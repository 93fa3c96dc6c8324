// src/supervisor/state.rs

//! Pure supervisor state machine.
//!
//! [`SupervisorCore`] consumes [`SupervisorEvent`]s and returns the
//! [`SupervisorAction`]s the async shell must carry out. It owns no
//! processes, channels, or timers, so every transition is unit tested
//! without Tokio.

use std::fmt;
use std::time::Duration;

use crate::types::ShutdownMode;

/// Lifecycle of the single server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Ready,
    Terminating,
    Stopped,
}

impl ServerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerState::Starting => "starting",
            ServerState::Ready => "ready",
            ServerState::Terminating => "terminating",
            ServerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A proxied health probe reached the server and succeeded.
    ProbeSucceeded,
    /// SIGTERM / SIGINT reached the supervisor.
    TerminationRequested,
    /// The server process exited. `code` is `None` when killed by a signal.
    ChildExited { code: Option<i32> },
    /// The grace period armed by [`SupervisorAction::ArmGraceTimer`] ran out.
    GraceExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    Publish(ServerState),
    /// SIGTERM to the server's process group.
    SendGraceful,
    /// SIGKILL to the server's process group.
    ForceKill,
    ArmGraceTimer(Duration),
    Finish(RunOutcome),
}

/// How the run phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Termination was requested and the server exited within the grace period.
    Graceful { code: Option<i32> },
    /// Termination was requested and the server had to be killed.
    Forced,
    /// The server exited without being asked to.
    Exited { code: Option<i32> },
}

impl RunOutcome {
    /// Process exit status for `stagehand run`.
    ///
    /// Shutdown, graceful or forced, is a clean exit. A server that stops on
    /// its own passes its exit code through, or 1 if a signal killed it.
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Graceful { .. } | RunOutcome::Forced => 0,
            RunOutcome::Exited { code } => code.unwrap_or(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorCore {
    state: ServerState,
    mode: ShutdownMode,
    grace_period: Duration,
    killed: bool,
}

impl SupervisorCore {
    pub fn new(mode: ShutdownMode, grace_period: Duration) -> Self {
        Self {
            state: ServerState::Starting,
            mode,
            grace_period,
            killed: false,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn step(&mut self, event: SupervisorEvent) -> Vec<SupervisorAction> {
        use SupervisorAction as A;
        use SupervisorEvent as E;
        use ServerState as S;

        match (self.state, event) {
            (S::Stopped, _) => Vec::new(),

            (S::Starting, E::ProbeSucceeded) => self.enter(S::Ready, Vec::new()),
            (_, E::ProbeSucceeded) => Vec::new(),

            (S::Starting | S::Ready, E::TerminationRequested) => match self.mode {
                ShutdownMode::Forward => self.enter(
                    S::Terminating,
                    vec![A::SendGraceful, A::ArmGraceTimer(self.grace_period)],
                ),
                ShutdownMode::Forced => {
                    self.killed = true;
                    self.enter(S::Terminating, vec![A::ForceKill])
                }
            },
            // A repeated request, or the grace period running out, escalates once.
            (S::Terminating, E::TerminationRequested | E::GraceExpired) => self.escalate(),

            (S::Starting | S::Ready, E::GraceExpired) => Vec::new(),

            (S::Starting | S::Ready, E::ChildExited { code }) => {
                self.enter(S::Stopped, vec![A::Finish(RunOutcome::Exited { code })])
            }
            (S::Terminating, E::ChildExited { code }) => {
                let outcome = if self.killed {
                    RunOutcome::Forced
                } else {
                    RunOutcome::Graceful { code }
                };
                self.enter(S::Stopped, vec![A::Finish(outcome)])
            }
        }
    }

    fn enter(&mut self, next: ServerState, then: Vec<SupervisorAction>) -> Vec<SupervisorAction> {
        self.state = next;
        let mut actions = Vec::with_capacity(then.len() + 1);
        actions.push(SupervisorAction::Publish(next));
        actions.extend(then);
        actions
    }

    fn escalate(&mut self) -> Vec<SupervisorAction> {
        if self.killed {
            return Vec::new();
        }
        self.killed = true;
        vec![SupervisorAction::ForceKill]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use SupervisorAction as A;
    use SupervisorEvent as E;

    const GRACE: Duration = Duration::from_secs(10);

    fn forward() -> SupervisorCore {
        SupervisorCore::new(ShutdownMode::Forward, GRACE)
    }

    #[test]
    fn first_probe_success_makes_the_server_ready() {
        let mut core = forward();
        assert_eq!(core.step(E::ProbeSucceeded), vec![A::Publish(ServerState::Ready)]);
        assert_eq!(core.step(E::ProbeSucceeded), vec![]);
        assert_eq!(core.state(), ServerState::Ready);
    }

    #[test]
    fn forward_mode_sends_sigterm_and_arms_the_grace_timer() {
        let mut core = forward();
        core.step(E::ProbeSucceeded);
        assert_eq!(
            core.step(E::TerminationRequested),
            vec![
                A::Publish(ServerState::Terminating),
                A::SendGraceful,
                A::ArmGraceTimer(GRACE)
            ]
        );
        assert_eq!(
            core.step(E::ChildExited { code: Some(0) }),
            vec![
                A::Publish(ServerState::Stopped),
                A::Finish(RunOutcome::Graceful { code: Some(0) })
            ]
        );
    }

    #[test]
    fn grace_expiry_kills_once_and_finishes_as_forced() {
        let mut core = forward();
        core.step(E::TerminationRequested);
        assert_eq!(core.step(E::GraceExpired), vec![A::ForceKill]);
        assert_eq!(core.step(E::TerminationRequested), vec![]);
        assert_eq!(
            core.step(E::ChildExited { code: None }),
            vec![
                A::Publish(ServerState::Stopped),
                A::Finish(RunOutcome::Forced)
            ]
        );
    }

    #[test]
    fn second_termination_request_escalates() {
        let mut core = forward();
        core.step(E::TerminationRequested);
        assert_eq!(core.step(E::TerminationRequested), vec![A::ForceKill]);
    }

    #[test]
    fn forced_mode_kills_immediately() {
        let mut core = SupervisorCore::new(ShutdownMode::Forced, GRACE);
        assert_eq!(
            core.step(E::TerminationRequested),
            vec![A::Publish(ServerState::Terminating), A::ForceKill]
        );
        assert_eq!(core.step(E::GraceExpired), vec![]);
        assert_eq!(
            core.step(E::ChildExited { code: None }).last(),
            Some(&A::Finish(RunOutcome::Forced))
        );
    }

    #[test]
    fn crash_is_reported_with_the_child_exit_code() {
        let mut core = forward();
        core.step(E::ProbeSucceeded);
        let actions = core.step(E::ChildExited { code: Some(3) });
        assert_eq!(actions.last(), Some(&A::Finish(RunOutcome::Exited { code: Some(3) })));
        assert_eq!(RunOutcome::Exited { code: Some(3) }.exit_code(), 3);
        assert_eq!(RunOutcome::Exited { code: None }.exit_code(), 1);
        assert_eq!(RunOutcome::Forced.exit_code(), 0);
    }

    #[test]
    fn stopped_ignores_everything() {
        let mut core = forward();
        core.step(E::ChildExited { code: Some(0) });
        assert_eq!(core.state(), ServerState::Stopped);
        for event in [
            E::ProbeSucceeded,
            E::TerminationRequested,
            E::GraceExpired,
            E::ChildExited { code: Some(1) },
        ] {
            assert!(core.step(event).is_empty());
        }
    }

    #[test]
    fn probe_success_while_terminating_does_not_revive() {
        let mut core = forward();
        core.step(E::TerminationRequested);
        assert!(core.step(E::ProbeSucceeded).is_empty());
        assert_eq!(core.state(), ServerState::Terminating);
    }
}
