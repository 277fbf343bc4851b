//! Launching the tunnel-client executable.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::SupervisorError;

/// Executable name of the tunnel client.
pub const CLIENT_BINARY: &str = "dnstt-client";

/// Places searched, in order, when no explicit client path is given. Bare
/// names are looked up on `PATH`.
pub const CLIENT_CANDIDATES: [&str; 3] = ["./dnstt-client", "./dnstt-client.exe", CLIENT_BINARY];

/// Why a single run of the tunnel client did not succeed.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("failed to start tunnel client: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed waiting for tunnel client: {0}")]
    Wait(#[source] std::io::Error),

    #[error("tunnel client exited with status {}", display_code(.code))]
    Exited { code: Option<i32> },
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown (terminated by signal)".to_string(),
    }
}

/// The process id of the tunnel client currently running, if any.
///
/// Shared between the supervision loop, which fills it while a child is
/// alive, and the signal relay, which reads it to forward termination. A
/// termination requested while the slot is empty is remembered, and the next
/// [`set`](ChildSlot::set) reports it so the new child can be stopped.
#[derive(Debug, Clone, Default)]
pub struct ChildSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Debug, Default)]
struct SlotState {
    pid: Option<u32>,
    terminating: bool,
}

impl ChildSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the child's pid. Returns `true` when termination was already
    /// requested, in which case the caller must stop the child itself.
    pub fn set(&self, pid: u32) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.pid = Some(pid);
        state.terminating
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).pid = None;
    }

    pub fn current(&self) -> Option<u32> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).pid
    }

    pub fn terminating(&self) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).terminating
    }

    /// Sends SIGTERM to the running child and marks the slot as terminating.
    /// Returns `false` when no child is running or the signal could not be
    /// delivered.
    pub fn terminate(&self) -> bool {
        let pid = {
            let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            state.terminating = true;
            state.pid
        };
        match pid {
            Some(pid) => send_terminate(pid),
            None => false,
        }
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "Failed to signal tunnel client");
    }
    rc == 0
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) -> bool {
    warn!(pid, "Forwarding termination is not supported on this platform");
    false
}

/// Runs the tunnel client once.
#[async_trait]
pub trait TunnelLauncher: Send + Sync {
    /// Runs the client to completion with `args`. The child's pid is kept in
    /// `slot` for as long as it is running.
    async fn run(&self, args: &[String], slot: &ChildSlot) -> Result<(), AttemptError>;
}

/// Spawns the real tunnel-client executable with inherited standard streams.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Finds the tunnel client. An explicit path must resolve; otherwise the
    /// working directory is checked before `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, SupervisorError> {
        if let Some(path) = explicit {
            return which::which(path)
                .map(Self::new)
                .map_err(|_| SupervisorError::ClientNotFound {
                    searched: path.display().to_string(),
                });
        }

        CLIENT_CANDIDATES
            .iter()
            .find_map(|candidate| which::which(candidate).ok())
            .map(Self::new)
            .ok_or_else(|| SupervisorError::ClientNotFound {
                searched: CLIENT_CANDIDATES.join(", "),
            })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl TunnelLauncher for ProcessLauncher {
    async fn run(&self, args: &[String], slot: &ChildSlot) -> Result<(), AttemptError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(AttemptError::Spawn)?;

        if let Some(pid) = child.id() {
            debug!(pid, program = %self.program.display(), "Tunnel client started");
            if slot.set(pid) {
                info!(pid, "Shutdown already requested, stopping tunnel client");
                send_terminate(pid);
            }
        }
        let status = child.wait().await;
        slot.clear();

        let status = status.map_err(AttemptError::Wait)?;
        if status.success() {
            info!("Tunnel client exited cleanly");
            Ok(())
        } else {
            Err(AttemptError::Exited {
                code: status.code(),
            })
        }
    }
}
