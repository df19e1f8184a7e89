//! Child process lifecycle: spawn, wait, and timeout escalation.
//!
//! The lifecycle is an explicit state machine so the race between process
//! exit and timeout has exactly one winner:
//!
//! ```text
//! Pending --Spawned--> Running --Exited--> Draining --OutputClosed---> Completed
//!    |                    |                    \-----TimeoutElapsed--> TimedOut
//!    |                    \------------TimeoutElapsed-----------------> TimedOut
//!    \----SpawnFailed----> Failed
//! ```
//!
//! `Draining` covers descendants that inherited the output pipes: the run
//! only completes once both pipes close, and the same deadline applies. The
//! child leads its own process group so termination reaches them too.
//!
//! Once `TimedOut` is reached the eventual exit of the child is only reaped,
//! never reported.

use std::{
    ffi::OsString,
    io,
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

use wait_timeout::ChildExt;

use super::{
    error::ExecError,
    pipes::{
        CapturedStream, OutputStream, detach_readers, join_reader, readers_finished_by,
        spawn_pipe_reader,
    },
    signal,
};

/// Exit code reported when the child was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Exit information for a finished child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildExit {
    code: Option<i32>,
}

impl ChildExit {
    /// Exit with the given status code, or `None` for signal termination.
    #[must_use]
    pub const fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    /// Raw status code, absent when the child was killed by a signal.
    #[must_use]
    pub const fn code(self) -> Option<i32> {
        self.code
    }

    /// Status code with signal termination mapped to [`SIGNAL_EXIT_CODE`].
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self.code {
            Some(code) => code,
            None => SIGNAL_EXIT_CODE,
        }
    }
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        Self::new(status.code())
    }
}

/// Lifecycle state of a supervised child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Not yet spawned.
    Pending,
    /// Spawned and not yet finished.
    Running,
    /// Exited, but its output pipes are still open.
    Draining(ChildExit),
    /// Exited and closed its output before the timeout.
    Completed(ChildExit),
    /// Outlived the timeout and was signalled.
    TimedOut {
        /// Whether the forced kill was needed after the grace period.
        forced_kill: bool,
    },
    /// Could not be spawned.
    Failed,
}

/// Events that drive [`ProcessState`] transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The OS started the process.
    Spawned,
    /// The OS refused to start the process.
    SpawnFailed,
    /// The process exited on its own.
    Exited(ChildExit),
    /// Both output pipes reached end of file.
    OutputClosed,
    /// The timeout elapsed and escalation finished.
    TimeoutElapsed {
        /// Whether the forced kill was needed after the grace period.
        forced_kill: bool,
    },
}

impl ProcessState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::TimedOut { .. } | Self::Failed
        )
    }

    /// Apply `event`, rejecting transitions the lifecycle does not allow.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Lifecycle`] for an illegal transition, including
    /// any event applied to a terminal state.
    pub fn on(self, event: ProcessEvent) -> Result<Self, ExecError> {
        match (self, event) {
            (Self::Pending, ProcessEvent::Spawned) => Ok(Self::Running),
            (Self::Pending, ProcessEvent::SpawnFailed) => Ok(Self::Failed),
            (Self::Running, ProcessEvent::Exited(exit)) => Ok(Self::Draining(exit)),
            (Self::Draining(exit), ProcessEvent::OutputClosed) => Ok(Self::Completed(exit)),
            (
                Self::Running | Self::Draining(_),
                ProcessEvent::TimeoutElapsed { forced_kill },
            ) => Ok(Self::TimedOut { forced_kill }),
            (from, rejected) => Err(ExecError::Lifecycle {
                from,
                event: rejected,
            }),
        }
    }
}

/// Operations the supervisor needs from a running child.
///
/// Implemented for real processes by [`SpawnedChild`]; tests substitute a
/// mock to drive the exit/timeout race deterministically.
pub(crate) trait ChildProcess {
    /// Wait up to `timeout` for the child to exit.
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ChildExit>>;
    /// Ask the child and its process group to shut down (SIGTERM on Unix).
    fn terminate(&mut self) -> io::Result<()>;
    /// Kill the child and its process group outright.
    fn kill(&mut self) -> io::Result<()>;
    /// Block until the child has been reaped.
    fn wait(&mut self) -> io::Result<ChildExit>;
}

struct SpawnedChild {
    child: Child,
}

impl ChildProcess for SpawnedChild {
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ChildExit>> {
        Ok(self.child.wait_timeout(timeout)?.map(ChildExit::from))
    }

    fn terminate(&mut self) -> io::Result<()> {
        signal::terminate(&mut self.child)
    }

    fn kill(&mut self) -> io::Result<()> {
        signal::kill(&mut self.child)?;
        // Covers a child that moved itself out of the group.
        match self.child.kill() {
            Err(err) if err.kind() != io::ErrorKind::InvalidInput => Err(err),
            _ => Ok(()),
        }
    }

    fn wait(&mut self) -> io::Result<ChildExit> {
        self.child.wait().map(ChildExit::from)
    }
}

/// Wait for `child` to finish, escalating to termination after `timeout`.
///
/// `running` is the state the child is in when supervision starts. Returns
/// [`ProcessState::Draining`] when the child exits in time, otherwise
/// [`ProcessState::TimedOut`].
pub(crate) fn supervise<C>(
    child: &mut C,
    running: ProcessState,
    timeout: Duration,
    grace: Duration,
) -> Result<ProcessState, ExecError>
where
    C: ChildProcess,
{
    if let Some(exit) = child.wait_timeout(timeout).map_err(ExecError::Io)? {
        return running.on(ProcessEvent::Exited(exit));
    }
    tracing::warn!(?timeout, "command timed out; sending termination signal");
    let forced_kill = escalate(child, grace).map_err(ExecError::Io)?;
    running.on(ProcessEvent::TimeoutElapsed { forced_kill })
}

/// Graceful signal, grace period, then forced kill. Returns whether the
/// kill was needed.
fn escalate<C>(child: &mut C, grace: Duration) -> io::Result<bool>
where
    C: ChildProcess,
{
    if let Err(err) = child.terminate() {
        tracing::debug!("failed to signal timed-out command: {err}");
    }
    match child.wait_timeout(grace) {
        Ok(Some(exit)) => {
            tracing::debug!(code = ?exit.code(), "command exited after termination signal");
            return Ok(false);
        }
        Ok(None) => {}
        Err(err) => tracing::debug!("failed to wait for terminated command: {err}"),
    }
    tracing::warn!(?grace, "command ignored termination signal; killing");
    if let Err(err) = child.kill()
        && err.kind() != io::ErrorKind::InvalidInput
    {
        return Err(err);
    }
    if let Err(err) = child.wait() {
        tracing::warn!("failed to reap killed command: {err}");
    }
    Ok(true)
}

/// Wait for the output of an exited child to close, at most until `deadline`.
///
/// `output_closed_by` reports whether every pipe reached end of file before
/// the instant it is given. When descendants still hold the pipes at the
/// deadline the process group is terminated, then killed if the pipes stay
/// open through `grace`.
pub(crate) fn drain<C, W>(
    child: &mut C,
    draining: ProcessState,
    deadline: Instant,
    grace: Duration,
    mut output_closed_by: W,
) -> Result<ProcessState, ExecError>
where
    C: ChildProcess,
    W: FnMut(Instant) -> bool,
{
    if output_closed_by(deadline) {
        return draining.on(ProcessEvent::OutputClosed);
    }
    tracing::warn!("command exited but descendants kept its output open; terminating them");
    if let Err(err) = child.terminate() {
        tracing::debug!("failed to signal lingering descendants: {err}");
    }
    if output_closed_by(Instant::now() + grace) {
        return draining.on(ProcessEvent::TimeoutElapsed { forced_kill: false });
    }
    tracing::warn!(?grace, "descendants ignored termination signal; killing");
    child.kill().map_err(ExecError::Io)?;
    draining.on(ProcessEvent::TimeoutElapsed { forced_kill: true })
}

/// Captured output of a command that ran to completion.
#[derive(Debug)]
pub(crate) struct CompletedProcess {
    pub(crate) exit: ChildExit,
    pub(crate) stdout: CapturedStream,
    pub(crate) stderr: CapturedStream,
}

/// Limits applied to one process run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RunLimits {
    pub(crate) timeout: Duration,
    pub(crate) grace: Duration,
    pub(crate) max_capture_bytes: usize,
}

/// Spawn `program` with `args` directly (never through a shell) in exactly
/// the environment `env`, and supervise it to completion.
pub(crate) fn run_process<E>(
    program: &str,
    args: &[String],
    env: E,
    limits: RunLimits,
) -> Result<CompletedProcess, ExecError>
where
    E: IntoIterator<Item = (OsString, OsString)>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    signal::isolate(&mut command);

    let spawned = command.spawn();
    let deadline = Instant::now() + limits.timeout;
    let state = ProcessState::Pending.on(if spawned.is_ok() {
        ProcessEvent::Spawned
    } else {
        ProcessEvent::SpawnFailed
    })?;
    let mut child = match spawned {
        Ok(child) => SpawnedChild { child },
        Err(source) => {
            tracing::debug!(program, %source, ?state, "spawn failed");
            return Err(ExecError::Spawn {
                program: program.to_owned(),
                source,
            });
        }
    };
    tracing::debug!(program, pid = child.child.id(), ?state, "command running");

    let stdout_reader = spawn_pipe_reader(child.child.stdout.take(), limits.max_capture_bytes);
    let stderr_reader = spawn_pipe_reader(child.child.stderr.take(), limits.max_capture_bytes);

    let supervised = supervise(&mut child, state, limits.timeout, limits.grace).and_then(|state| {
        if !matches!(state, ProcessState::Draining(_)) {
            return Ok(state);
        }
        drain(&mut child, state, deadline, limits.grace, |by| {
            readers_finished_by(by, &[stdout_reader.as_ref(), stderr_reader.as_ref()])
        })
    });
    let outcome = match supervised {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Err(kill_err) = child.kill() {
                tracing::debug!("failed to kill child after supervision error: {kill_err}");
            }
            if let Err(wait_err) = child.wait() {
                tracing::debug!("failed to reap child after supervision error: {wait_err}");
            }
            detach_readers(stdout_reader, stderr_reader);
            return Err(err);
        }
    };

    match outcome {
        ProcessState::Completed(exit) => {
            let stdout = join_reader(stdout_reader, OutputStream::Stdout).map_err(ExecError::Io)?;
            let stderr = join_reader(stderr_reader, OutputStream::Stderr).map_err(ExecError::Io)?;
            tracing::debug!(program, code = ?exit.code(), "command completed");
            Ok(CompletedProcess {
                exit,
                stdout,
                stderr,
            })
        }
        ProcessState::TimedOut { forced_kill } => {
            if let Err(err) = child.kill() {
                tracing::debug!("failed to sweep process group after timeout: {err}");
            }
            detach_readers(stdout_reader, stderr_reader);
            Err(ExecError::Timeout {
                program: program.to_owned(),
                timeout: limits.timeout,
                forced_kill,
            })
        }
        unfinished => {
            detach_readers(stdout_reader, stderr_reader);
            Err(ExecError::Io(io::Error::other(format!(
                "supervision stopped in non-terminal state {unfinished:?}"
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{Sequence, mock};
    use rstest::rstest;

    mock! {
        Child {}
        impl ChildProcess for Child {
            fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ChildExit>>;
            fn terminate(&mut self) -> io::Result<()>;
            fn kill(&mut self) -> io::Result<()>;
            fn wait(&mut self) -> io::Result<ChildExit>;
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(300);
    const GRACE: Duration = Duration::from_millis(50);

    #[rstest]
    fn exit_before_timeout_starts_draining() {
        let mut child = MockChild::new();
        child
            .expect_wait_timeout()
            .withf(|timeout| *timeout == TIMEOUT)
            .times(1)
            .returning(|_| Ok(Some(ChildExit::new(Some(3)))));
        child.expect_terminate().never();
        child.expect_kill().never();

        let state = supervise(&mut child, ProcessState::Running, TIMEOUT, GRACE).expect("supervise");
        assert_eq!(state, ProcessState::Draining(ChildExit::new(Some(3))));
    }

    const EXITED: ProcessState = ProcessState::Draining(ChildExit::new(Some(0)));

    #[rstest]
    fn closed_output_completes_without_signals() {
        let mut child = MockChild::new();
        child.expect_terminate().never();
        child.expect_kill().never();
        let deadline = Instant::now() + TIMEOUT;
        let mut asked = Vec::new();

        let state = drain(&mut child, EXITED, deadline, GRACE, |by| {
            asked.push(by);
            true
        })
        .expect("drain");
        assert_eq!(state, ProcessState::Completed(ChildExit::new(Some(0))));
        assert_eq!(asked, [deadline]);
    }

    #[rstest]
    fn held_output_terminates_the_group_at_the_deadline() {
        let mut seq = Sequence::new();
        let mut child = MockChild::new();
        child
            .expect_terminate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        child.expect_kill().never();
        let mut polls = 0;

        let state = drain(&mut child, EXITED, Instant::now(), GRACE, |_| {
            polls += 1;
            polls > 1
        })
        .expect("drain");
        assert_eq!(state, ProcessState::TimedOut { forced_kill: false });
        assert_eq!(polls, 2);
    }

    #[rstest]
    fn output_held_through_grace_kills_the_group() {
        let mut seq = Sequence::new();
        let mut child = MockChild::new();
        child
            .expect_terminate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        child
            .expect_kill()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        child.expect_wait().never();

        let state = drain(&mut child, EXITED, Instant::now(), GRACE, |_| false).expect("drain");
        assert_eq!(state, ProcessState::TimedOut { forced_kill: true });
    }

    #[rstest]
    fn group_kill_failure_while_draining_is_reported() {
        let mut child = MockChild::new();
        child.expect_terminate().returning(|| Ok(()));
        child
            .expect_kill()
            .returning(|| Err(io::Error::from(io::ErrorKind::PermissionDenied)));

        let err = drain(&mut child, EXITED, Instant::now(), GRACE, |_| false)
            .expect_err("kill failure");
        assert!(matches!(err, ExecError::Io(ref io) if io.kind() == io::ErrorKind::PermissionDenied));
    }

    #[rstest]
    fn draining_requires_an_exited_child() {
        let mut child = MockChild::new();
        let err = drain(&mut child, ProcessState::Running, Instant::now(), GRACE, |_| true)
            .expect_err("running child has not exited");
        assert!(matches!(
            err,
            ExecError::Lifecycle {
                from: ProcessState::Running,
                event: ProcessEvent::OutputClosed,
            }
        ));
    }

    #[rstest]
    fn timeout_with_graceful_exit_skips_kill() {
        let mut seq = Sequence::new();
        let mut child = MockChild::new();
        child
            .expect_wait_timeout()
            .withf(|timeout| *timeout == TIMEOUT)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        child
            .expect_terminate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        child
            .expect_wait_timeout()
            .withf(|timeout| *timeout == GRACE)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(ChildExit::new(None))));
        child.expect_kill().never();

        let state = supervise(&mut child, ProcessState::Running, TIMEOUT, GRACE).expect("supervise");
        assert_eq!(state, ProcessState::TimedOut { forced_kill: false });
    }

    #[rstest]
    fn timeout_escalates_to_kill_after_grace() {
        let mut child = MockChild::new();
        child
            .expect_wait_timeout()
            .times(2)
            .returning(|_| Ok(None));
        child.expect_terminate().times(1).returning(|| Ok(()));
        child.expect_kill().times(1).returning(|| Ok(()));
        child
            .expect_wait()
            .times(1)
            .returning(|| Ok(ChildExit::new(None)));

        let state = supervise(&mut child, ProcessState::Running, TIMEOUT, GRACE).expect("supervise");
        assert_eq!(state, ProcessState::TimedOut { forced_kill: true });
    }

    #[rstest]
    fn failed_termination_signal_still_kills() {
        let mut child = MockChild::new();
        child.expect_wait_timeout().returning(|_| Ok(None));
        child
            .expect_terminate()
            .times(1)
            .returning(|| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        child.expect_kill().times(1).returning(|| Ok(()));
        child
            .expect_wait()
            .times(1)
            .returning(|| Ok(ChildExit::new(None)));

        let state = supervise(&mut child, ProcessState::Running, TIMEOUT, GRACE).expect("supervise");
        assert_eq!(state, ProcessState::TimedOut { forced_kill: true });
    }

    #[rstest]
    fn kill_failure_is_reported() {
        let mut child = MockChild::new();
        child.expect_wait_timeout().returning(|_| Ok(None));
        child.expect_terminate().returning(|| Ok(()));
        child
            .expect_kill()
            .returning(|| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        child.expect_wait().never();

        let err = supervise(&mut child, ProcessState::Running, TIMEOUT, GRACE).expect_err("kill failure");
        assert!(matches!(err, ExecError::Io(ref io) if io.kind() == io::ErrorKind::PermissionDenied));
    }

    #[rstest]
    fn supervising_unspawned_child_is_rejected() {
        let mut child = MockChild::new();
        child
            .expect_wait_timeout()
            .returning(|_| Ok(Some(ChildExit::new(Some(0)))));
        let err = supervise(&mut child, ProcessState::Pending, TIMEOUT, GRACE)
            .expect_err("pending child cannot complete");
        assert!(matches!(
            err,
            ExecError::Lifecycle {
                from: ProcessState::Pending,
                ..
            }
        ));
    }

    #[rstest]
    fn wait_failure_is_reported() {
        let mut child = MockChild::new();
        child
            .expect_wait_timeout()
            .returning(|_| Err(io::Error::other("wait failed")));
        let err = supervise(&mut child, ProcessState::Running, TIMEOUT, GRACE).expect_err("wait failure");
        assert!(matches!(err, ExecError::Io(_)));
    }

    #[rstest]
    #[case(ProcessState::Pending, ProcessEvent::Spawned, ProcessState::Running)]
    #[case(ProcessState::Pending, ProcessEvent::SpawnFailed, ProcessState::Failed)]
    #[case(
        ProcessState::Running,
        ProcessEvent::Exited(ChildExit::new(Some(0))),
        ProcessState::Draining(ChildExit::new(Some(0)))
    )]
    #[case(
        ProcessState::Draining(ChildExit::new(Some(4))),
        ProcessEvent::OutputClosed,
        ProcessState::Completed(ChildExit::new(Some(4)))
    )]
    #[case(
        ProcessState::Draining(ChildExit::new(Some(0))),
        ProcessEvent::TimeoutElapsed { forced_kill: false },
        ProcessState::TimedOut { forced_kill: false }
    )]
    #[case(
        ProcessState::Running,
        ProcessEvent::TimeoutElapsed { forced_kill: true },
        ProcessState::TimedOut { forced_kill: true }
    )]
    fn legal_transitions(
        #[case] from: ProcessState,
        #[case] event: ProcessEvent,
        #[case] to: ProcessState,
    ) {
        assert_eq!(from.on(event).expect("legal transition"), to);
    }

    #[rstest]
    #[case(ProcessState::Pending, ProcessEvent::Exited(ChildExit::new(Some(0))))]
    #[case(ProcessState::Running, ProcessEvent::Spawned)]
    #[case(ProcessState::Running, ProcessEvent::OutputClosed)]
    #[case(
        ProcessState::Draining(ChildExit::new(Some(0))),
        ProcessEvent::Exited(ChildExit::new(Some(0)))
    )]
    #[case(
        ProcessState::TimedOut { forced_kill: false },
        ProcessEvent::Exited(ChildExit::new(Some(0)))
    )]
    #[case(
        ProcessState::Completed(ChildExit::new(Some(0))),
        ProcessEvent::TimeoutElapsed { forced_kill: false }
    )]
    #[case(ProcessState::Failed, ProcessEvent::Spawned)]
    fn illegal_transitions_are_rejected(#[case] from: ProcessState, #[case] event: ProcessEvent) {
        let err = from.on(event).expect_err("illegal transition");
        assert!(matches!(err, ExecError::Lifecycle { from: f, event: e } if f == from && e == event));
    }

    #[rstest]
    #[case(Some(0), 0)]
    #[case(Some(42), 42)]
    #[case(None, SIGNAL_EXIT_CODE)]
    fn exit_code_normalises_signal_termination(#[case] code: Option<i32>, #[case] expected: i32) {
        assert_eq!(ChildExit::new(code).exit_code(), expected);
    }

    #[rstest]
    fn terminal_states_are_flagged() {
        assert!(!ProcessState::Pending.is_terminal());
        assert!(!ProcessState::Running.is_terminal());
        assert!(!ProcessState::Draining(ChildExit::new(Some(0))).is_terminal());
        assert!(ProcessState::Failed.is_terminal());
        assert!(ProcessState::TimedOut { forced_kill: false }.is_terminal());
        assert!(ProcessState::Completed(ChildExit::new(Some(1))).is_terminal());
    }
}
