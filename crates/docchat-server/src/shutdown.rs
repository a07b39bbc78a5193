//! Process shutdown for the gateway.
//!
//! One `CancellationToken` is watched by the listener (axum graceful
//! shutdown) and by the session registry, which closes every live session
//! when it fires. [`ShutdownCoordinator`] owns that token, waits for the OS
//! signal that trips it, and drains the gateway's own tasks under a single
//! deadline.

use std::fmt;
use std::io;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Long-lived tasks the gateway waits for before exiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayTask {
    /// The session registry actor.
    Registry,
    /// The HTTP/WebSocket accept loop.
    Listener,
}

impl GatewayTask {
    /// Label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Listener => "listener",
        }
    }
}

impl fmt::Display for GatewayTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What ended [`ShutdownCoordinator::wait_for_signal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownCause {
    /// Ctrl-C / SIGINT.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// [`ShutdownCoordinator::trigger`] was called in-process.
    Requested,
}

/// How each tracked task ended during a drain.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Returned before the deadline.
    pub finished: Vec<GatewayTask>,
    /// Panicked or was cancelled.
    pub failed: Vec<GatewayTask>,
    /// Still running at the deadline; aborted.
    pub aborted: Vec<GatewayTask>,
}

impl DrainReport {
    /// Every tracked task returned on its own.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_empty()
    }
}

/// Owns the gateway's shutdown token and the tasks that must drain.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<(GatewayTask, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token and no tracked tasks.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Clone of the shutdown token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the token. Idempotent.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("gateway shutdown triggered");
        }
        self.token.cancel();
    }

    /// Whether the token has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Register a task to be awaited by [`drain`](Self::drain).
    pub fn track(&self, task: GatewayTask, handle: JoinHandle<()>) {
        self.tasks.lock().push((task, handle));
    }

    /// Tasks currently tracked, in registration order.
    pub fn tracked(&self) -> Vec<GatewayTask> {
        self.tasks.lock().iter().map(|(task, _)| *task).collect()
    }

    /// Resolve on Ctrl-C, SIGTERM, or an in-process [`trigger`](Self::trigger).
    ///
    /// Does not fire the token; [`drain`](Self::drain) does.
    pub async fn wait_for_signal(&self) -> io::Result<ShutdownCause> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Ok(ShutdownCause::Requested),
            res = tokio::signal::ctrl_c() => res.map(|()| ShutdownCause::Interrupt),
            res = terminate_signal() => res.map(|()| ShutdownCause::Terminate),
        }
    }

    /// Fire the token, then await every tracked task until `grace` elapses.
    ///
    /// Tasks share one deadline; any still running when it passes are aborted.
    pub async fn drain(&self, grace: Duration) -> DrainReport {
        self.trigger();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let deadline = Instant::now() + grace;
        info!(
            tasks = tasks.len(),
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "draining gateway tasks"
        );

        let mut report = DrainReport::default();
        for (task, mut handle) in tasks {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.finished.push(task),
                Ok(Err(e)) => {
                    warn!(%task, error = %e, "gateway task failed during shutdown");
                    report.failed.push(task);
                }
                Err(_) => {
                    handle.abort();
                    warn!(%task, "gateway task missed the shutdown deadline, aborting");
                    report.aborted.push(task);
                }
            }
        }
        report
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn terminate_signal() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let _ = signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> io::Result<()> {
    std::future::pending().await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
