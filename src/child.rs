//! Child-process supervision
//!
//! Spawning captures stdout explicitly; the pipe between the child and
//! the encoder is the only buffer, so a slow response sink backpressures
//! the child through it with no policy of our own.

use crate::errors::{Error, Result};
use crate::status::Status;

use std::ffi::OsStr;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

/// A handle on a running child whose stdout has been taken for streaming
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Launches `command` with stdout piped, stdin closed, and stderr
    /// inherited, returning the process handle and the readable end of
    /// its stdout.
    pub fn spawn<S, I, A>(command: S, args: I) -> Result<(ChildProcess, ChildStdout)>
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(Error::Launch)?;

        match child.stdout.take() {
            Some(output) => Ok((ChildProcess { child }, output)),
            None => Err(Error::Launch(io::Error::new(
                io::ErrorKind::Other,
                "spawned child did not capture stdout",
            ))),
        }
    }

    /// Blocks until the child terminates and classifies the result.
    ///
    /// Callers must drain (or drop) the child's stdout first; reaping a
    /// child that is still writing would block on a full pipe.
    pub fn wait(&mut self) -> Result<ExitOutcome> {
        let status = self.child.wait()?;
        Ok(ExitOutcome::from_status(status))
    }
}

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    ExitedZero,
    ExitedNonzero(i32),
    Signaled(i32),
}

impl ExitOutcome {
    fn from_status(status: ExitStatus) -> ExitOutcome {
        match status.code() {
            Some(0) => ExitOutcome::ExitedZero,
            Some(code) => ExitOutcome::ExitedNonzero(code),
            // On Unix, no exit code means a signal ended the process.
            None => ExitOutcome::Signaled(status.signal().unwrap_or(-1)),
        }
    }

    /// The total mapping from termination to trailer status: a clean exit
    /// is `200 OK`, everything else is `500 Internal Server Error`.
    pub fn http_status(&self) -> Status {
        match *self {
            ExitOutcome::ExitedZero => Status::ok(),
            _ => Status::internal_error(),
        }
    }
}

#[cfg(test)]
fn run_shell(script: &str) -> ExitOutcome {
    let (mut child, output) = ChildProcess::spawn("/bin/sh", ["-c", script]).unwrap();
    drop(output);
    child.wait().unwrap()
}

#[test]
fn clean_exit_maps_to_ok() {
    let outcome = run_shell("exit 0");
    assert_eq!(outcome, ExitOutcome::ExitedZero);
    assert_eq!(outcome.http_status(), Status::ok());
}

#[test]
fn nonzero_exit_maps_to_internal_error() {
    let outcome = run_shell("exit 3");
    assert_eq!(outcome, ExitOutcome::ExitedNonzero(3));
    assert_eq!(outcome.http_status(), Status::internal_error());
}

#[test]
fn signal_maps_to_internal_error() {
    let outcome = run_shell("kill -KILL $$");
    assert_eq!(outcome, ExitOutcome::Signaled(9));
    assert_eq!(outcome.http_status(), Status::internal_error());
}

#[test]
fn missing_command_is_a_launch_error() {
    match ChildProcess::spawn("/no/such/binary", Vec::<&str>::new()) {
        Err(Error::Launch(_)) => (),
        Err(other) => panic!("{:?}", other),
        Ok(_) => panic!("spawning a missing binary succeeded"),
    }
}
