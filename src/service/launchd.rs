//! launchd service registration (macOS).
//!
//! User-level installs write a LaunchAgent plist to
//! `~/Library/LaunchAgents`; system-level installs write a LaunchDaemon
//! to `/Library/LaunchDaemons`. Control goes through `launchctl`.

use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use crate::service::manager::{ServiceManager, ServiceStatus, check_control, run_control};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// launchd-backed [`ServiceManager`].
pub struct LaunchdManager {
    config: ServiceConfig,
}

impl LaunchdManager {
    /// Create a manager for the given service identity.
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    fn label(&self) -> String {
        self.config.label()
    }

    fn plist_path(&self) -> Result<PathBuf> {
        if self.config.system_level {
            Ok(PathBuf::from("/Library/LaunchDaemons").join(format!("{}.plist", self.label())))
        } else {
            let home = dirs::home_dir().ok_or_else(|| {
                WardenError::Service("cannot determine home directory".to_owned())
            })?;
            Ok(home
                .join("Library")
                .join("LaunchAgents")
                .join(format!("{}.plist", self.label())))
        }
    }

    fn launchctl(&self, args: &[&str]) -> Result<std::process::Output> {
        run_control(Command::new("launchctl").args(args))
    }

    fn plist(&self, exe: &Path) -> String {
        let log = self.config.log_dir().join("launchd.log");
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>run</string>
    </array>
    <key>WorkingDirectory</key>
    <string>{workdir}</string>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
    <key>StandardOutPath</key>
    <string>{log}</string>
    <key>StandardErrorPath</key>
    <string>{log}</string>
    <key>EnvironmentVariables</key>
    <dict>
        <key>RUST_LOG</key>
        <string>info</string>
    </dict>
</dict>
</plist>
"#,
            label = self.label(),
            exe = exe.display(),
            workdir = self.config.working_dir.display(),
            log = log.display(),
        )
    }
}

impl ServiceManager for LaunchdManager {
    fn installed(&self) -> Result<bool> {
        Ok(self.plist_path()?.exists())
    }

    fn install(&self) -> Result<()> {
        let exe = std::env::current_exe()?;
        let path = self.plist_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.plist(&exe))?;

        check_control(
            self.launchctl(&["load", "-w", &path.to_string_lossy()])?,
            "launchctl load",
        )?;

        info!("installed launchd plist at {}", path.display());
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let path = self.plist_path()?;
        // Unload fails when the job was never loaded; removal still
        // de-registers it.
        let _ = self.launchctl(&["unload", &path.to_string_lossy()]);
        std::fs::remove_file(&path)?;

        info!("removed launchd plist {}", path.display());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        check_control(self.launchctl(&["start", &self.label()])?, "launchctl start")
    }

    fn stop(&self) -> Result<()> {
        check_control(self.launchctl(&["stop", &self.label()])?, "launchctl stop")
    }

    fn restart(&self) -> Result<()> {
        // launchd has no single restart primitive; with KeepAlive set, a
        // stop is followed by an automatic relaunch.
        check_control(self.launchctl(&["stop", &self.label()])?, "launchctl stop")
    }

    fn status(&self) -> Result<ServiceStatus> {
        let output = self.launchctl(&["list", &self.label()])?;
        if !output.status.success() {
            return Ok(ServiceStatus::Stopped);
        }
        // A loaded job lists a "PID" entry only while running.
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.contains("\"PID\"") {
            Ok(ServiceStatus::Running)
        } else {
            Ok(ServiceStatus::Stopped)
        }
    }
}
