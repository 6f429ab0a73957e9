//! systemd service registration (Linux).
//!
//! User-level installs write a unit to `~/.config/systemd/user` and drive
//! `systemctl --user`; system-level installs use `/etc/systemd/system`
//! and plain `systemctl`.

use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use crate::service::manager::{ServiceManager, ServiceStatus, check_control, run_control};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// systemd-backed [`ServiceManager`].
pub struct SystemdManager {
    config: ServiceConfig,
}

impl SystemdManager {
    /// Create a manager for the given service identity.
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    fn unit_name(&self) -> String {
        format!("{}.service", self.config.name)
    }

    fn unit_path(&self) -> Result<PathBuf> {
        if self.config.system_level {
            Ok(PathBuf::from("/etc/systemd/system").join(self.unit_name()))
        } else {
            let home = dirs::home_dir().ok_or_else(|| {
                WardenError::Service("cannot determine home directory".to_owned())
            })?;
            Ok(home
                .join(".config")
                .join("systemd")
                .join("user")
                .join(self.unit_name()))
        }
    }

    fn systemctl(&self, args: &[&str]) -> Result<std::process::Output> {
        let mut cmd = Command::new("systemctl");
        if !self.config.system_level {
            cmd.arg("--user");
        }
        cmd.args(args);
        run_control(&mut cmd)
    }

    fn unit_file(&self, exe: &Path) -> String {
        let wanted_by = if self.config.system_level {
            "multi-user.target"
        } else {
            "default.target"
        };
        format!(
            "[Unit]\n\
             Description={description}\n\
             After=network-online.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             ExecStart={exe} run\n\
             WorkingDirectory={workdir}\n\
             Restart=always\n\
             RestartSec=5\n\
             Environment=RUST_LOG=info\n\
             \n\
             [Install]\n\
             WantedBy={wanted_by}\n",
            description = self.config.description,
            exe = exe.display(),
            workdir = self.config.working_dir.display(),
        )
    }
}

impl ServiceManager for SystemdManager {
    fn installed(&self) -> Result<bool> {
        Ok(self.unit_path()?.exists())
    }

    fn install(&self) -> Result<()> {
        let exe = std::env::current_exe()?;
        let path = self.unit_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.unit_file(&exe))?;

        check_control(self.systemctl(&["daemon-reload"])?, "systemctl daemon-reload")?;
        check_control(
            self.systemctl(&["enable", &self.unit_name()])?,
            "systemctl enable",
        )?;

        info!("installed systemd unit at {}", path.display());
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        // Disable may fail when the unit was never enabled; the file
        // removal is what de-registers it.
        let _ = self.systemctl(&["disable", "--now", &self.unit_name()]);
        std::fs::remove_file(self.unit_path()?)?;
        check_control(self.systemctl(&["daemon-reload"])?, "systemctl daemon-reload")?;

        info!("removed systemd unit {}", self.unit_name());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        check_control(
            self.systemctl(&["start", &self.unit_name()])?,
            "systemctl start",
        )
    }

    fn stop(&self) -> Result<()> {
        check_control(
            self.systemctl(&["stop", &self.unit_name()])?,
            "systemctl stop",
        )
    }

    fn restart(&self) -> Result<()> {
        check_control(
            self.systemctl(&["restart", &self.unit_name()])?,
            "systemctl restart",
        )
    }

    fn status(&self) -> Result<ServiceStatus> {
        // `is-active` exits non-zero for inactive units; the stdout word
        // is the authoritative answer.
        let output = self.systemctl(&["is-active", &self.unit_name()])?;
        let state = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        Ok(match state.as_str() {
            "active" | "activating" | "reloading" => ServiceStatus::Running,
            "inactive" | "failed" | "deactivating" => ServiceStatus::Stopped,
            _ => ServiceStatus::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn manager() -> SystemdManager {
        SystemdManager::new(ServiceConfig {
            working_dir: PathBuf::from("/srv/warden"),
            ..Default::default()
        })
    }

    #[test]
    fn unit_name_carries_service_suffix() {
        assert_eq!(manager().unit_name(), "warden.service");
    }

    #[test]
    fn unit_file_runs_the_run_subcommand() {
        let unit = manager().unit_file(Path::new("/usr/local/bin/warden"));
        assert!(unit.contains("ExecStart=/usr/local/bin/warden run"));
        assert!(unit.contains("WorkingDirectory=/srv/warden"));
        assert!(unit.contains("Restart=always"));
        assert!(unit.contains("WantedBy=default.target"));
    }

    #[test]
    fn system_level_unit_targets_multi_user() {
        let mgr = SystemdManager::new(ServiceConfig {
            system_level: true,
            ..Default::default()
        });
        let unit = mgr.unit_file(Path::new("/usr/local/bin/warden"));
        assert!(unit.contains("WantedBy=multi-user.target"));
        assert_eq!(
            mgr.unit_path().unwrap(),
            PathBuf::from("/etc/systemd/system/warden.service")
        );
    }

    #[test]
    fn user_level_unit_lives_in_home() {
        let path = manager().unit_path().unwrap();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains(".config/systemd/user"));
        assert!(path_str.ends_with("warden.service"));
    }
}
