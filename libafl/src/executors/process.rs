//! POSIX-shaped child control: fork, suspend, resume, wait, with child
//! termination classified into fuzzer-relevant outcomes.

use std::sync::{Mutex, MutexGuard, OnceLock};

use nix::{
    sys::{
        signal::{kill, Signal},
        wait::{waitpid, WaitPidFlag, WaitStatus},
    },
    unistd::Pid,
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// How a fork attempt resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ForkOutcome {
    /// We're the child.
    Child,
    /// We're the parent; the child's pid has been recorded.
    Parent,
    /// `fork()` itself failed.
    ForkFailed,
}

/// How a target's run ended, classified from `waitpid`'s status.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ExitKind {
    /// Exited normally (any exit code).
    Normal,
    /// Stopped (only reachable when `wait` was called with
    /// `untraced = true`).
    Stop,
    /// Killed by `SIGKILL` — the core's timeout convention.
    Timeout,
    /// Killed by `SIGSEGV`.
    Segv,
    /// Killed by `SIGABRT`.
    Abrt,
    /// Killed by `SIGBUS`.
    Bus,
    /// Killed by `SIGILL`.
    Ill,
    /// Killed by any other signal.
    Crash,
}

/// POSIX-shaped control over one target child. `current()` lazily
/// builds the process-wide singleton with the caller's own pid on
/// first call; every subsequent call returns the same object.
pub struct Process {
    handler_process: Option<Pid>,
}

static CURRENT_PROCESS: OnceLock<Mutex<Process>> = OnceLock::new();

impl Process {
    /// The process-wide current-process singleton, lazily initialised
    /// with `getpid()` on first access. Guarded by a `Mutex` so
    /// initialisation racing from, say, a signal handler can't produce
    /// two singletons.
    pub fn current() -> MutexGuard<'static, Process> {
        CURRENT_PROCESS
            .get_or_init(|| {
                Mutex::new(Process {
                    handler_process: Some(nix::unistd::getpid()),
                })
            })
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The pid this process object currently controls, if any.
    #[must_use]
    pub fn handler_process(&self) -> Option<Pid> {
        self.handler_process
    }

    /// Forks. On `Parent`, records the child's pid in
    /// `handler_process`; on `Child`, leaves it untouched (the child
    /// has no handler process of its own yet); on `ForkFailed`,
    /// nothing is mutated.
    pub fn fork(&mut self) -> ForkOutcome {
        // SAFETY: the fuzzer core assumes a simple fork/exec-free child
        // that immediately runs the target harness; no other threads
        // are expected to be running concurrently in the forking
        // process.
        match unsafe { nix::unistd::fork() } {
            Ok(nix::unistd::ForkResult::Child) => ForkOutcome::Child,
            Ok(nix::unistd::ForkResult::Parent { child }) => {
                self.handler_process = Some(child);
                ForkOutcome::Parent
            }
            Err(_) => ForkOutcome::ForkFailed,
        }
    }

    /// Sends `SIGSTOP` to the handler process.
    pub fn suspend(&self) {
        if let Some(pid) = self.handler_process {
            let _ = kill(pid, Signal::SIGSTOP);
        }
    }

    /// Sends `SIGCONT` to the handler process.
    pub fn resume(&self) {
        if let Some(pid) = self.handler_process {
            let _ = kill(pid, Signal::SIGCONT);
        }
    }

    /// Blocks for the handler process and classifies its termination.
    /// A failed `waitpid`, or a status this core doesn't recognise
    /// (neither exited, signalled, nor stopped), is fatal: the core
    /// has no recovery strategy for a lost or unclassifiable child.
    pub fn wait(&self, untraced: bool) -> Result<ExitKind, Error> {
        let pid = self
            .handler_process
            .ok_or_else(|| Error::fatal("wait() with no handler process"))?;
        let flags = if untraced {
            Some(WaitPidFlag::WUNTRACED)
        } else {
            None
        };
        match waitpid(pid, flags) {
            Ok(WaitStatus::Exited(_, _)) => Ok(ExitKind::Normal),
            Ok(WaitStatus::Stopped(_, _)) => Ok(ExitKind::Stop),
            Ok(WaitStatus::Signaled(_, signal, _)) => Ok(match signal {
                Signal::SIGKILL => ExitKind::Timeout,
                Signal::SIGSEGV => ExitKind::Segv,
                Signal::SIGABRT => ExitKind::Abrt,
                Signal::SIGBUS => ExitKind::Bus,
                Signal::SIGILL => ExitKind::Ill,
                _ => ExitKind::Crash,
            }),
            Ok(other) => {
                log::error!("unhandled wait status, treating as fatal: {other:?}");
                Err(Error::fatal(format!("unhandled wait status: {other:?}")))
            }
            Err(e) => {
                log::error!("waitpid failed, treating as fatal: {e}");
                Err(Error::fatal(format!("waitpid failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::raise;

    #[test]
    fn current_is_a_singleton() {
        let a = Process::current().handler_process();
        let b = Process::current().handler_process();
        assert_eq!(a, b);
        assert_eq!(a, Some(nix::unistd::getpid()));
    }

    #[test]
    fn fork_child_exits_normally() {
        let mut process = Process {
            handler_process: None,
        };
        match process.fork() {
            ForkOutcome::Child => std::process::exit(0),
            ForkOutcome::Parent => {
                assert_eq!(process.wait(false).unwrap(), ExitKind::Normal);
            }
            ForkOutcome::ForkFailed => panic!("fork failed"),
        }
    }

    #[test]
    fn fork_child_killed_is_timeout() {
        let mut process = Process {
            handler_process: None,
        };
        match process.fork() {
            ForkOutcome::Child => {
                let _ = raise(Signal::SIGKILL);
                std::process::exit(1);
            }
            ForkOutcome::Parent => {
                assert_eq!(process.wait(false).unwrap(), ExitKind::Timeout);
            }
            ForkOutcome::ForkFailed => panic!("fork failed"),
        }
    }

    #[test]
    fn fork_child_segv_is_classified() {
        let mut process = Process {
            handler_process: None,
        };
        match process.fork() {
            ForkOutcome::Child => {
                let _ = raise(Signal::SIGSEGV);
                std::process::exit(1);
            }
            ForkOutcome::Parent => {
                assert_eq!(process.wait(false).unwrap(), ExitKind::Segv);
            }
            ForkOutcome::ForkFailed => panic!("fork failed"),
        }
    }
}
