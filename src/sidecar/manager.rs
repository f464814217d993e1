//! Sidecar lifecycle management for a local emulator process.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::sidecar::config::{LaunchSpec, READINESS_MARKER, SidecarEndpoint};
use crate::sidecar::error::{Result, SidecarError};

/// How long a stopped sidecar may take to exit before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// State of a sidecar process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarState {
    /// Not started yet.
    NotStarted,
    /// Spawned, waiting for the readiness marker.
    Starting,
    /// Running and ready for calls.
    Ready,
    /// Terminated, or failed to become ready. Final.
    Stopped,
}

/// Supervises a single emulator child process.
///
/// Owns the child, its endpoint and the task draining its stderr. One
/// manager runs at most one process over its lifetime.
pub struct SidecarManager {
    state: SidecarState,
    child: Option<Child>,
    endpoint: Option<SidecarEndpoint>,
    reader: Option<JoinHandle<usize>>,
}

impl SidecarManager {
    /// Create a manager in the `NotStarted` state.
    pub fn new() -> Self {
        Self {
            state: SidecarState::NotStarted,
            child: None,
            endpoint: None,
            reader: None,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> SidecarState {
        self.state
    }

    /// Check if the sidecar is ready.
    pub fn is_ready(&self) -> bool {
        self.state == SidecarState::Ready
    }

    /// Get the endpoint once ready.
    pub fn endpoint(&self) -> Option<&SidecarEndpoint> {
        self.endpoint.as_ref()
    }

    /// OS process id of the running child.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Launch the sidecar and block until it reports readiness.
    ///
    /// Resolves to an error if the process cannot be spawned, if its stderr
    /// ends or fails before the readiness marker, or if the startup deadline
    /// passes. In every failure case the child is killed and the manager ends
    /// up `Stopped`.
    pub async fn start(&mut self, spec: &LaunchSpec) -> Result<SidecarEndpoint> {
        if self.state != SidecarState::NotStarted {
            return Err(SidecarError::launch(format!(
                "sidecar cannot start from state {:?}",
                self.state
            )));
        }
        self.state = SidecarState::Starting;

        let (program, args) = spec.command_line();
        tracing::debug!("Launching sidecar: {} {:?}", program, args);

        let mut child = match Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.state = SidecarState::Stopped;
                return Err(SidecarError::launch(format!(
                    "failed to spawn {}: {}",
                    program, e
                )));
            }
        };

        let Some(stderr) = child.stderr.take() else {
            kill_and_reap(&mut child).await;
            self.state = SidecarState::Stopped;
            return Err(SidecarError::launch("sidecar stderr was not captured"));
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let forward = spec.log_level.forwards_child_output();
        let reader = tokio::spawn(watch_output(stderr, forward, ready_tx));

        let outcome = tokio::select! {
            signal = ready_rx => match signal {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(SidecarError::ReadinessStreamClosed(e)),
                Err(_) => Err(SidecarError::ReadinessStreamClosed(std::io::Error::other(
                    "output reader stopped without a result",
                ))),
            },
            _ = tokio::time::sleep(spec.startup_timeout) => {
                Err(SidecarError::ReadinessTimeout {
                    timeout: spec.startup_timeout,
                })
            }
        };

        if let Err(e) = outcome {
            tracing::warn!("Sidecar failed to start: {}", e);
            kill_and_reap(&mut child).await;
            reader.abort();
            self.state = SidecarState::Stopped;
            return Err(e);
        }

        let endpoint = spec.endpoint();
        self.child = Some(child);
        self.reader = Some(reader);
        self.endpoint = Some(endpoint.clone());
        self.state = SidecarState::Ready;

        tracing::info!(
            "Sidecar ready at {} (admin {})",
            endpoint,
            endpoint.admin_port
        );

        Ok(endpoint)
    }

    /// Ask the sidecar to terminate.
    ///
    /// Sends a termination request and returns without waiting for the
    /// process to exit. A background task reaps the child and kills it if it
    /// is still running after [`TERMINATE_GRACE`]. Outside a tokio runtime the
    /// child is killed right away. Safe to call in any state, any number of
    /// times.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::debug!("Stopping sidecar (pid {:?})", child.id());
            terminate(&mut child);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(reap_with_grace(child));
                }
                // Dropping the child kills it.
                Err(_) => drop(child),
            }
        }
        // Detach: the reader drains whatever the child still prints and ends
        // at EOF.
        self.reader.take();
        self.endpoint = None;
        self.state = SidecarState::Stopped;
    }
}

impl Default for SidecarManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SidecarManager {
    fn drop(&mut self) {
        if self.child.is_some() {
            tracing::warn!("SidecarManager dropped without stop(), terminating sidecar");
            self.stop();
        }
    }
}

/// Drain the sidecar's diagnostic stream.
///
/// Signals readiness once, on the first line containing the marker, and
/// keeps forwarding afterwards. If the stream ends or fails before the marker
/// shows up, the failure is sent instead. Returns the number of lines read.
async fn watch_output<R>(
    stream: R,
    forward: bool,
    ready_tx: oneshot::Sender<std::io::Result<()>>,
) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut ready_tx = Some(ready_tx);
    let mut buf = Vec::new();
    let mut lines = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "sidecar closed its output before becoming ready",
                    )));
                }
                break;
            }
            Ok(_) => {
                lines += 1;
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if forward {
                    tracing::info!(target: "aetest::child", "{}", line);
                }
                if line.contains(READINESS_MARKER)
                    && let Some(tx) = ready_tx.take()
                {
                    let _ = tx.send(Ok(()));
                }
            }
            Err(e) => {
                match ready_tx.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(e));
                    }
                    None => tracing::debug!("Sidecar output closed: {}", e),
                }
                break;
            }
        }
    }

    lines
}

async fn reap_with_grace(mut child: Child) {
    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(Ok(status)) => tracing::debug!("Sidecar exited: {}", status),
        Ok(Err(e)) => tracing::warn!("Failed to wait for sidecar: {}", e),
        Err(_) => {
            tracing::warn!(
                "Sidecar ignored termination for {:?}, killing it",
                TERMINATE_GRACE
            );
            kill_and_reap(&mut child).await;
        }
    }
}

async fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill sidecar: {}", e);
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        tracing::warn!("Failed to send SIGTERM to sidecar {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to terminate sidecar: {}", e);
    }
}
