//! Child process spawning and graceful termination.

use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use crate::update::RestartHandle;
use tokio::process::{Child, Command};
use tracing::info;

/// The live child processes owned by a running supervisor.
///
/// Created by [`Supervisor::run`](crate::service::Supervisor::run) and
/// destroyed on stop or self-restart. Handles are written only by the
/// task that spawns them and read only during shutdown.
#[derive(Debug)]
pub struct RunningProcessHandle {
    /// The primary orchestrator child.
    pub orchestrator: Child,
    /// The optional web console child.
    pub ui: Option<Child>,
}

impl RunningProcessHandle {
    /// Spawn the orchestrator, plus the web console when enabled.
    ///
    /// # Errors
    ///
    /// Returns `Process` when either executable cannot be spawned.
    pub fn spawn(config: &ServiceConfig) -> Result<Self> {
        let orchestrator = spawn_orchestrator(config)?;
        let ui = if config.ui_enabled {
            Some(spawn_ui(config)?)
        } else {
            None
        };
        Ok(Self { orchestrator, ui })
    }

    /// PIDs of all live children.
    pub fn pids(&self) -> Vec<u32> {
        let mut pids = Vec::new();
        if let Some(pid) = self.orchestrator.id() {
            pids.push(pid);
        }
        if let Some(pid) = self.ui.as_ref().and_then(Child::id) {
            pids.push(pid);
        }
        pids
    }

    /// Send a graceful interrupt to every live child. No force-kill: a
    /// child that ignores the interrupt is bounded only by the host
    /// service manager's own timeout.
    pub fn interrupt_all(&mut self) {
        interrupt(&mut self.orchestrator);
        if let Some(ui) = self.ui.as_mut() {
            interrupt(ui);
        }
    }

    /// Wait for every child to exit.
    pub async fn wait_all(&mut self) {
        if let Err(e) = self.orchestrator.wait().await {
            tracing::warn!("waiting for orchestrator failed: {e}");
        }
        if let Some(ui) = self.ui.as_mut()
            && let Err(e) = ui.wait().await
        {
            tracing::warn!("waiting for console failed: {e}");
        }
    }
}

/// Spawn the orchestrator child in the service working directory.
fn spawn_orchestrator(config: &ServiceConfig) -> Result<Child> {
    let path = config.orchestrator_path();
    let mut cmd = Command::new(&path);
    cmd.current_dir(&config.working_dir)
        .envs(project_env(config))
        .kill_on_drop(false);

    let child = cmd.spawn().map_err(|e| {
        WardenError::Process(format!("cannot spawn orchestrator {}: {e}", path.display()))
    })?;
    info!(
        "orchestrator started (pid {:?}, {})",
        child.id(),
        path.display()
    );
    Ok(child)
}

/// Spawn the web console child with its listen port in the environment.
fn spawn_ui(config: &ServiceConfig) -> Result<Child> {
    let path = config.ui_path();
    let mut cmd = Command::new(&path);
    cmd.current_dir(&config.working_dir)
        .envs(project_env(config))
        .env("WARDEN_UI_PORT", config.ui_port.to_string())
        .kill_on_drop(false);

    let child = cmd.spawn().map_err(|e| {
        WardenError::Process(format!("cannot spawn console {}: {e}", path.display()))
    })?;
    info!(
        "console started (pid {:?}, port {})",
        child.id(),
        config.ui_port
    );
    Ok(child)
}

/// Environment enrichment for children: the project bin directory ahead
/// of `PATH`, plus project-local variables.
fn project_env(config: &ServiceConfig) -> Vec<(String, String)> {
    let sep = if cfg!(windows) { ';' } else { ':' };
    let path = std::env::var("PATH").unwrap_or_default();

    vec![
        (
            "PATH".to_owned(),
            format!("{}{sep}{path}", config.bin_dir().display()),
        ),
        (
            "WARDEN_WORKDIR".to_owned(),
            config.working_dir.display().to_string(),
        ),
        ("WARDEN_VERSION".to_owned(), config.version.clone()),
    ]
}

/// Send a graceful interrupt to a child.
fn interrupt(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            interrupt_pid(pid);
        }
    }
    #[cfg(not(unix))]
    {
        // No SIGINT equivalent; termination is the closest available.
        let _ = child.start_kill();
    }
}

/// Send SIGINT to an arbitrary PID (Unix).
#[cfg(unix)]
pub(crate) fn interrupt_pid(pid: u32) {
    // SAFETY: plain signal send to a PID this process spawned.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGINT);
    }
}

/// Terminate an arbitrary PID (Windows has no cross-process SIGINT).
#[cfg(not(unix))]
pub(crate) fn interrupt_pid(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .output();
}

/// Production restart handle for the update coordinator.
///
/// Interrupts the supervised children by PID, then terminates this
/// process so the host service manager relaunches the updated binary.
/// This exit is the only intentional self-termination path.
pub struct ProcessRestart {
    pids: Vec<u32>,
}

impl ProcessRestart {
    /// Create a handle over the given child PIDs.
    pub fn new(pids: Vec<u32>) -> Self {
        Self { pids }
    }
}

impl RestartHandle for ProcessRestart {
    fn interrupt_children(&self) {
        for pid in &self.pids {
            info!("interrupting child pid {pid} for self-update restart");
            interrupt_pid(*pid);
        }
    }

    fn exit_process(&self) {
        info!("exiting so the service manager relaunches the updated binary");
        std::process::exit(0);
    }
}
