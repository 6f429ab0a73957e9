//! Service lifecycle management.
//!
//! The host-OS integration is platform-polymorphic: one
//! [`ServiceManager`] implementation per service manager (systemd,
//! launchd, Windows SCM), selected at runtime. The [`Supervisor`] wraps a
//! manager with idempotency checks and owns the spawned child processes.

pub mod launchd;
pub mod manager;
pub mod process;
pub mod supervisor;
pub mod systemd;
pub mod windows;

pub use manager::{ServiceManager, ServiceStatus, platform_manager};
pub use process::{ProcessRestart, RunningProcessHandle};
pub use supervisor::Supervisor;
