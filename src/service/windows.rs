//! Windows service registration via the Service Control Manager.
//!
//! Registration and control go through `sc.exe`; the service runs the
//! same `warden run` entry point as the Unix platforms. Windows has no
//! user-level SCM services, so `system_level` is effectively always true
//! here.

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::service::manager::{ServiceManager, ServiceStatus, check_control, run_control};
use std::process::Command;
use tracing::info;

/// SCM-backed [`ServiceManager`].
pub struct ScmManager {
    config: ServiceConfig,
}

impl ScmManager {
    /// Create a manager for the given service identity.
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    fn sc(&self, args: &[&str]) -> Result<std::process::Output> {
        run_control(Command::new("sc.exe").args(args))
    }

    fn bin_path_argument(&self) -> Result<String> {
        let exe = std::env::current_exe()?;
        Ok(format!("\"{}\" run", exe.display()))
    }
}

impl ServiceManager for ScmManager {
    fn installed(&self) -> Result<bool> {
        Ok(self.sc(&["query", &self.config.name])?.status.success())
    }

    fn install(&self) -> Result<()> {
        let bin_path = self.bin_path_argument()?;
        let display = format!("DisplayName= {}", self.config.display_name);
        check_control(
            self.sc(&[
                "create",
                &self.config.name,
                &format!("binPath= {bin_path}"),
                "start= auto",
                &display,
            ])?,
            "sc create",
        )?;
        // Description is a separate call in the sc.exe interface.
        let _ = self.sc(&["description", &self.config.name, &self.config.description]);

        info!("registered service {} with the SCM", self.config.name);
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let _ = self.sc(&["stop", &self.config.name]);
        check_control(self.sc(&["delete", &self.config.name])?, "sc delete")?;

        info!("removed service {} from the SCM", self.config.name);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        check_control(self.sc(&["start", &self.config.name])?, "sc start")
    }

    fn stop(&self) -> Result<()> {
        check_control(self.sc(&["stop", &self.config.name])?, "sc stop")
    }

    fn restart(&self) -> Result<()> {
        // The SCM has no restart verb; stop-then-start is the primitive.
        let _ = self.sc(&["stop", &self.config.name]);
        check_control(self.sc(&["start", &self.config.name])?, "sc start")
    }

    fn status(&self) -> Result<ServiceStatus> {
        let output = self.sc(&["query", &self.config.name])?;
        if !output.status.success() {
            return Ok(ServiceStatus::Unknown);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("RUNNING") {
            Ok(ServiceStatus::Running)
        } else if stdout.contains("STOPPED") {
            Ok(ServiceStatus::Stopped)
        } else {
            Ok(ServiceStatus::Unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn bin_path_argument_quotes_exe_and_appends_run() {
        let mgr = ScmManager::new(ServiceConfig::default());
        let arg = mgr.bin_path_argument().unwrap();
        assert!(arg.starts_with('"'));
        assert!(arg.ends_with("\" run"));
    }
}
