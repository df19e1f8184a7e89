//! Process-group isolation and signalling for supervised children.
//!
//! On Unix each child leads its own process group, so a timeout reaches
//! every descendant still holding the capture pipes, not only the direct
//! child.

use std::{
    io,
    process::{Child, Command},
};

/// Make the spawned child the leader of a new process group.
#[cfg(unix)]
pub(super) fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
pub(super) fn isolate(_command: &mut Command) {}

/// Ask the child's process group to exit by sending `SIGTERM`.
#[cfg(unix)]
pub(super) fn terminate(child: &mut Child) -> io::Result<()> {
    signal_group(child, rustix::process::Signal::TERM)
}

/// Send `SIGKILL` to the child's process group.
#[cfg(unix)]
pub(super) fn kill(child: &mut Child) -> io::Result<()> {
    signal_group(child, rustix::process::Signal::KILL)
}

/// A group whose members have all exited is already in the requested state.
#[cfg(unix)]
fn signal_group(child: &Child, signal: rustix::process::Signal) -> io::Result<()> {
    use rustix::{
        io::Errno,
        process::{Pid, kill_process_group},
    };

    match kill_process_group(Pid::from_child(child), signal) {
        Ok(()) => Ok(()),
        Err(errno) if errno == Errno::SRCH => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// No portable graceful signal exists; fall back to killing `child`.
#[cfg(not(unix))]
pub(super) fn terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

#[cfg(not(unix))]
pub(super) fn kill(child: &mut Child) -> io::Result<()> {
    child.kill()
}
