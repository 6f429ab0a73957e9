//! warden: self-updating background service supervisor.
//!
//! Registers itself with the host service manager (systemd, launchd, or
//! the Windows SCM), supervises a child orchestrator process plus an
//! optional web console, and keeps its own binary current: a background
//! coordinator polls a release feed, downloads the platform asset,
//! verifies it against a checksum manifest, atomically replaces the
//! running executable, and exits so the service manager relaunches the
//! updated binary.

pub mod config;
pub mod error;
pub mod service;
pub mod update;

pub use config::ServiceConfig;
pub use error::{Result, WardenError};

/// Version injected at build time via `WARDEN_VERSION`.
///
/// Builds without an injected version report `dev` and never self-update.
pub fn build_version() -> &'static str {
    option_env!("WARDEN_VERSION").unwrap_or("dev")
}
