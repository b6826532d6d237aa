//! Agent process supervision.
//!
//! Keeps one `craftmind-agent` child alive: spawn, wait, record the exit,
//! delay, respawn. The agent already survives session-level failures on
//! its own; this layer only covers process death (panic, OOM kill,
//! operator mistake). Status is a snapshot for the HTTP surface.

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct SupervisorConfig {
    /// Explicit agent binary path; resolved automatically when unset.
    pub agent_bin: Option<PathBuf>,
    pub restart_delay: Duration,
}

impl SupervisorConfig {
    pub fn from_env() -> Self {
        let agent_bin = env::var_os("CRAFTMIND_AGENT_BIN").map(PathBuf::from);
        let restart_delay = env::var("CRAFTMIND_RESTART_DELAY_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));
        Self {
            agent_bin,
            restart_delay,
        }
    }
}

/// Point-in-time view of the supervised agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub running: bool,
    pub pid: Option<u32>,
    /// Times the agent has been (re)started beyond the initial launch.
    pub restarts: u32,
    pub uptime_secs: u64,
    pub last_exit: Option<String>,
}

#[derive(Default)]
struct State {
    running: bool,
    pid: Option<u32>,
    restarts: u32,
    started_at: Option<Instant>,
    last_exit: Option<String>,
}

pub struct Supervisor {
    state: Mutex<State>,
}

impl Supervisor {
    /// Start supervising. The loop runs until the token is cancelled; on
    /// cancellation the child is killed and awaited.
    pub fn spawn(
        config: SupervisorConfig,
        cancel: CancellationToken,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let supervisor = Arc::new(Self {
            state: Mutex::new(State::default()),
        });
        let handle = tokio::spawn(supervisor.clone().run(config, cancel));
        (supervisor, handle)
    }

    pub fn status(&self) -> AgentStatus {
        let state = self.state.lock();
        AgentStatus {
            running: state.running,
            pid: state.pid,
            restarts: state.restarts,
            uptime_secs: state
                .started_at
                .filter(|_| state.running)
                .map(|started| started.elapsed().as_secs())
                .unwrap_or(0),
            last_exit: state.last_exit.clone(),
        }
    }

    async fn run(self: Arc<Self>, config: SupervisorConfig, cancel: CancellationToken) {
        let agent_bin = match config.agent_bin.clone().map(Ok).unwrap_or_else(find_agent_binary) {
            Ok(path) => path,
            Err(err) => {
                error!("cannot supervise agent: {err}");
                self.state.lock().last_exit = Some(err.to_string());
                return;
            }
        };
        info!(agent = %agent_bin.display(), "supervising agent binary");

        let mut first_launch = true;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            if !first_launch {
                self.state.lock().restarts += 1;
            }
            first_launch = false;

            match Command::new(&agent_bin).kill_on_drop(true).spawn() {
                Ok(mut child) => {
                    {
                        let mut state = self.state.lock();
                        state.running = true;
                        state.pid = child.id();
                        state.started_at = Some(Instant::now());
                    }
                    info!(pid = ?child.id(), "agent started");

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("shutting down, stopping agent");
                            let _ = child.kill().await;
                            let _ = child.wait().await;
                            self.mark_stopped("stopped by supervisor shutdown");
                            return;
                        }
                        status = child.wait() => {
                            let summary = match status {
                                Ok(status) => status.to_string(),
                                Err(err) => format!("wait failed: {err}"),
                            };
                            warn!(exit = summary, "agent exited, restarting after delay");
                            self.mark_stopped(&summary);
                        }
                    }
                }
                Err(err) => {
                    error!("failed to spawn agent: {err}");
                    self.mark_stopped(&format!("spawn failed: {err}"));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(config.restart_delay) => {}
            }
        }
    }

    fn mark_stopped(&self, reason: &str) {
        let mut state = self.state.lock();
        state.running = false;
        state.pid = None;
        state.started_at = None;
        state.last_exit = Some(reason.to_string());
    }
}

/// Locate the agent binary.
///
/// Search order:
/// 1. Same directory as the current executable (dev: target/debug/)
/// 2. `craftmind-agent` on PATH
fn find_agent_binary() -> Result<PathBuf> {
    if let Ok(exe) = env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let sibling = dir.join("craftmind-agent");
        if sibling.is_file() {
            return Ok(sibling);
        }
    }

    if let Some(path) = find_in_path("craftmind-agent") {
        return Ok(path);
    }

    anyhow::bail!(
        "Could not find the `craftmind-agent` binary. \
         Set CRAFTMIND_AGENT_BIN or ensure it is on your PATH."
    )
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_supervisor_reports_not_running() {
        let supervisor = Supervisor {
            state: Mutex::new(State::default()),
        };
        let status = supervisor.status();
        assert!(!status.running);
        assert_eq!(status.pid, None);
        assert_eq!(status.restarts, 0);
        assert_eq!(status.uptime_secs, 0);
        assert_eq!(status.last_exit, None);
    }

    #[test]
    fn stopped_agent_has_no_uptime() {
        let supervisor = Supervisor {
            state: Mutex::new(State::default()),
        };
        {
            let mut state = supervisor.state.lock();
            state.running = true;
            state.pid = Some(4242);
            state.started_at = Some(Instant::now());
        }
        assert!(supervisor.status().running);

        supervisor.mark_stopped("exit status: 1");
        let status = supervisor.status();
        assert!(!status.running);
        assert_eq!(status.uptime_secs, 0);
        assert_eq!(status.last_exit.as_deref(), Some("exit status: 1"));
    }

    #[tokio::test]
    async fn missing_binary_records_the_failure_and_stops() {
        let config = SupervisorConfig {
            agent_bin: Some(PathBuf::from("/nonexistent/craftmind-agent")),
            restart_delay: Duration::from_millis(10),
        };
        let cancel = CancellationToken::new();
        let (supervisor, handle) = Supervisor::spawn(config, cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = supervisor.status();
        assert!(!status.running);
        assert!(status.last_exit.is_some());

        cancel.cancel();
        let _ = handle.await;
    }
}
