//! Service lifecycle supervisor.
//!
//! Wraps the platform [`ServiceManager`] with idempotency checks for the
//! operator-facing operations, and owns the child processes plus the
//! background update coordinator while the service runs.

use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use crate::service::manager::{ServiceManager, ServiceStatus, platform_manager};
use crate::service::process::{ProcessRestart, RunningProcessHandle};
use crate::update::coordinator::UpdateCoordinator;
use crate::update::feed::{DEFAULT_FEED_URL, HttpReleaseFeed};
use std::sync::Arc;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the service lifecycle: registration with the host service
/// manager, and the running child processes.
pub struct Supervisor {
    config: ServiceConfig,
    manager: Box<dyn ServiceManager>,
}

impl Supervisor {
    /// Create a supervisor with the platform's service manager.
    ///
    /// # Errors
    ///
    /// Returns `Service` on platforms without a supported service
    /// manager.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let manager = platform_manager(&config)?;
        Ok(Self { config, manager })
    }

    /// Create a supervisor over an explicit service manager. The seam
    /// used by tests to run against a fake host.
    pub fn with_manager(config: ServiceConfig, manager: Box<dyn ServiceManager>) -> Self {
        Self { config, manager }
    }

    /// The service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Register the service with the host.
    ///
    /// # Errors
    ///
    /// `AlreadyInstalled` when the service is already registered; the
    /// registration is left untouched in that case.
    pub fn install(&self) -> Result<()> {
        if self.manager.installed()? {
            return Err(WardenError::AlreadyInstalled);
        }
        self.manager.install()
    }

    /// Remove the registration.
    ///
    /// # Errors
    ///
    /// `NotInstalled` when the service is not registered.
    pub fn uninstall(&self) -> Result<()> {
        if !self.manager.installed()? {
            return Err(WardenError::NotInstalled);
        }
        self.manager.uninstall()
    }

    /// Start the registered service.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` when the OS reports the service as running.
    pub fn start(&self) -> Result<()> {
        if self.manager.status()? == ServiceStatus::Running {
            return Err(WardenError::AlreadyRunning);
        }
        self.manager.start()
    }

    /// Stop the registered service.
    ///
    /// # Errors
    ///
    /// `AlreadyStopped` when the OS reports the service as stopped.
    pub fn stop(&self) -> Result<()> {
        if self.manager.status()? == ServiceStatus::Stopped {
            return Err(WardenError::AlreadyStopped);
        }
        self.manager.stop()
    }

    /// Delegate to the host's restart primitive.
    pub fn restart(&self) -> Result<()> {
        self.manager.restart()
    }

    /// Current OS-reported status.
    pub fn status(&self) -> Result<ServiceStatus> {
        self.manager.status()
    }

    /// The service-manager "start" callback: run until shutdown.
    ///
    /// Spawns the orchestrator child (and the optional web console) in
    /// the service working directory, starts the update coordinator when
    /// auto-update is enabled, then waits. Returns when a termination
    /// signal arrives or the orchestrator exits on its own; either way
    /// the remaining children receive a graceful interrupt and are
    /// awaited, never force-killed.
    pub async fn run(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.working_dir)?;
        info!(
            "warden {} starting in {}",
            self.config.version,
            self.config.working_dir.display()
        );

        let cancel = CancellationToken::new();
        let mut handle = RunningProcessHandle::spawn(&self.config)?;

        if self.config.auto_update {
            let feed = Arc::new(HttpReleaseFeed::new(DEFAULT_FEED_URL, &self.config.version));
            let restart = Arc::new(ProcessRestart::new(handle.pids()));
            let coordinator = UpdateCoordinator::new(
                feed,
                restart,
                std::env::current_exe()?,
                self.config.version.clone(),
                self.config.check_interval,
                cancel.child_token(),
            );
            tokio::spawn(coordinator.run());
        } else {
            info!("auto-update disabled");
        }

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                status = handle.orchestrator.wait() => {
                    match status {
                        Ok(status) => warn!("orchestrator exited with {status}"),
                        Err(e) => warn!("orchestrator wait failed: {e}"),
                    }
                    break;
                }
                status = wait_optional(&mut handle.ui) => {
                    warn!("console exited: {status:?}");
                    handle.ui = None;
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        cancel.cancel();
        handle.interrupt_all();
        handle.wait_all().await;
        info!("warden shut down cleanly");
        Ok(())
    }
}

/// Wait on an optional child; pends forever when there is none so the
/// surrounding select ignores the branch.
async fn wait_optional(child: &mut Option<Child>) -> std::io::Result<std::process::ExitStatus> {
    match child.as_mut() {
        Some(child) => child.wait().await,
        None => std::future::pending().await,
    }
}

/// Resolve when the process receives a termination request.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let term = signal(SignalKind::terminate());
        let int = signal(SignalKind::interrupt());
        match (term, int) {
            (Ok(mut term), Ok(mut int)) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = int.recv() => {}
                }
            }
            _ => {
                // Signal registration failing is unusual; ctrl-c still works.
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
