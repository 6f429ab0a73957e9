//! Service configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default interval between update checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default port for the web console child process.
pub const DEFAULT_UI_PORT: u16 = 8090;

/// Identity and behavior of the supervised service.
///
/// Immutable after construction; owned exclusively by the
/// [`Supervisor`](crate::service::Supervisor). The binary builds one from
/// environment variables via [`ServiceConfig::from_env`]; library callers
/// construct it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service identifier used for unit/plist/SCM registration.
    pub name: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Description shown by the host service manager.
    pub description: String,
    /// Working directory for the service and its children.
    pub working_dir: PathBuf,
    /// Register system-wide instead of for the current user.
    pub system_level: bool,
    /// Run the background update coordinator.
    pub auto_update: bool,
    /// Running version string (e.g. `v1.2.0`). Development builds carry
    /// `dev` and never self-update.
    pub version: String,
    /// Spawn the web console child process.
    pub ui_enabled: bool,
    /// Port the web console listens on.
    pub ui_port: u16,
    /// Interval between update checks.
    pub check_interval: Duration,
    /// Orchestrator executable name, resolved inside `working_dir/bin`.
    pub orchestrator_bin: String,
    /// Web console executable name, resolved inside `working_dir/bin`.
    pub ui_bin: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "warden".to_owned(),
            display_name: "Warden".to_owned(),
            description: "Self-updating orchestrator service supervisor".to_owned(),
            working_dir: default_working_dir(),
            system_level: false,
            auto_update: true,
            version: crate::build_version().to_owned(),
            ui_enabled: false,
            ui_port: DEFAULT_UI_PORT,
            check_interval: DEFAULT_CHECK_INTERVAL,
            orchestrator_bin: "orc".to_owned(),
            ui_bin: "orc-console".to_owned(),
        }
    }
}

impl ServiceConfig {
    /// Build a config from `WARDEN_*` environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// Recognised variables: `WARDEN_WORKDIR`, `WARDEN_SYSTEM`,
    /// `WARDEN_NO_AUTO_UPDATE`, `WARDEN_UI`, `WARDEN_UI_PORT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = std::env::var_os("WARDEN_WORKDIR") {
            config.working_dir = PathBuf::from(dir);
        }
        config.system_level = env_flag("WARDEN_SYSTEM");
        if env_flag("WARDEN_NO_AUTO_UPDATE") {
            config.auto_update = false;
        }
        config.ui_enabled = env_flag("WARDEN_UI");
        if let Ok(port) = std::env::var("WARDEN_UI_PORT")
            && let Ok(port) = port.parse()
        {
            config.ui_port = port;
        }

        config
    }

    /// Directory holding the managed child executables.
    pub fn bin_dir(&self) -> PathBuf {
        self.working_dir.join("bin")
    }

    /// Absolute path of the orchestrator executable.
    pub fn orchestrator_path(&self) -> PathBuf {
        self.bin_dir().join(&self.orchestrator_bin)
    }

    /// Absolute path of the web console executable.
    pub fn ui_path(&self) -> PathBuf {
        self.bin_dir().join(&self.ui_bin)
    }

    /// Directory for the supervisor's rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.working_dir.join("logs")
    }

    /// Reverse-DNS label used for launchd registration.
    pub fn label(&self) -> String {
        format!("sh.warden.{}", self.name)
    }
}

/// `~/.warden`, or the current directory when no home is available.
fn default_working_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".warden"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// A variable counts as set unless it is empty, `0`, or `false`.
fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => !v.is_empty() && v != "0" && v != "false",
        Err(_) => false,
    }
}
