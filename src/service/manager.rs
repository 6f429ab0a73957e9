//! Host service-manager capability interface.

use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use std::process::Command;

/// OS-reported state of the registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// The service is running.
    Running,
    /// The service is registered but not running.
    Stopped,
    /// The host could not report a definite state.
    Unknown,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Capability interface over the host's service manager.
///
/// One implementation per platform; [`platform_manager`] selects the
/// right one at runtime. Implementations perform the raw registration and
/// control operations without idempotency checks; those live in the
/// [`Supervisor`](crate::service::Supervisor).
pub trait ServiceManager: Send + Sync {
    /// Whether the service is registered with the host.
    fn installed(&self) -> Result<bool>;

    /// Register the service.
    fn install(&self) -> Result<()>;

    /// Remove the registration, stopping the service first if needed.
    fn uninstall(&self) -> Result<()>;

    /// Start the registered service.
    fn start(&self) -> Result<()>;

    /// Stop the registered service.
    fn stop(&self) -> Result<()>;

    /// Delegate to the host's restart primitive.
    fn restart(&self) -> Result<()>;

    /// Current OS-reported status.
    fn status(&self) -> Result<ServiceStatus>;
}

/// Select the service manager for the running platform.
///
/// # Errors
///
/// Returns `Service` on platforms without a supported service manager.
pub fn platform_manager(config: &ServiceConfig) -> Result<Box<dyn ServiceManager>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(crate::service::systemd::SystemdManager::new(
            config.clone(),
        )))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(crate::service::launchd::LaunchdManager::new(
            config.clone(),
        )))
    }
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(crate::service::windows::ScmManager::new(
            config.clone(),
        )))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = config;
        Err(WardenError::Service(format!(
            "no service manager support for {}",
            std::env::consts::OS
        )))
    }
}

/// Run a service-manager control command, capturing output.
///
/// # Errors
///
/// `Service` when the command cannot be spawned at all. A non-zero exit
/// status is returned in the `Output` for the caller to interpret, since
/// several control tools exit non-zero for ordinary "not loaded" states.
pub(crate) fn run_control(cmd: &mut Command) -> Result<std::process::Output> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.output()
        .map_err(|e| WardenError::Service(format!("cannot run {program}: {e}")))
}

/// Map a failed control-command output to a `Service` error with the
/// tool's stderr in the message.
pub(crate) fn check_control(output: std::process::Output, what: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(WardenError::Service(format!(
        "{what} failed: {}",
        stderr.trim()
    )))
}
