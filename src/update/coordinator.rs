//! Background update loop.
//!
//! A single cooperative task owns the recurring check timer: each tick
//! asks the release feed for the latest version, and when a newer build
//! exists drives download, verification, and atomic replacement, then
//! signals the supervisor to restart. Every non-fatal outcome returns the
//! machine to `Idle`; the next tick retries from scratch. The loop never
//! crashes the supervisor process.

use crate::error::{Result, WardenError};
use crate::update::feed::{self, ReleaseFeed};
use crate::update::replace;
use crate::update::verify::{self, Verification};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Phase of the update state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Waiting for the next timer tick.
    #[default]
    Idle,
    /// Querying the release feed.
    Checking,
    /// Downloading the platform asset.
    Downloading,
    /// Comparing the download against the checksum manifest.
    Verifying,
    /// Swapping the new binary into place.
    Replacing,
    /// Replacement succeeded; the process is about to terminate so the
    /// host service manager relaunches the updated binary.
    RestartPending,
}

/// How the coordinator hands control back to the host service manager
/// after a successful replace.
///
/// The production implementation interrupts the supervised children and
/// terminates the process; test implementations count the calls.
pub trait RestartHandle: Send + Sync {
    /// Send a graceful interrupt to the supervised child process(es).
    fn interrupt_children(&self);

    /// Terminate this process. The production implementation does not
    /// return; the host service manager relaunches the updated binary.
    fn exit_process(&self);
}

/// In-memory coordinator state. Lost on restart, which is acceptable:
/// restart follows a successful update, and the timer retries otherwise.
#[derive(Debug, Default)]
struct CoordinatorState {
    phase: UpdatePhase,
    last_checked: Option<Instant>,
    last_error: Option<String>,
}

/// Periodically checks the release feed and replaces the running binary.
pub struct UpdateCoordinator {
    feed: Arc<dyn ReleaseFeed>,
    restart: Arc<dyn RestartHandle>,
    target: PathBuf,
    current_version: String,
    interval: Duration,
    cancel: CancellationToken,
    in_flight: AtomicBool,
    state: Arc<Mutex<CoordinatorState>>,
}

impl UpdateCoordinator {
    /// Create a coordinator that keeps the executable at `target` current.
    ///
    /// `current_version` is the running build's version string; empty or
    /// `dev` versions disable updating. The first check fires immediately
    /// when [`run`](Self::run) starts, then every `interval`.
    pub fn new(
        feed: Arc<dyn ReleaseFeed>,
        restart: Arc<dyn RestartHandle>,
        target: PathBuf,
        current_version: impl Into<String>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            feed,
            restart,
            target,
            current_version: current_version.into(),
            interval,
            cancel,
            in_flight: AtomicBool::new(false),
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> UpdatePhase {
        self.state.lock().map(|s| s.phase).unwrap_or_default()
    }

    /// Message of the most recent failed attempt, if any.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.last_error.clone())
    }

    /// Run the timer loop until cancelled or until an update restarts the
    /// process. Intended to be spawned as a background task.
    pub async fn run(self) {
        replace::clean_stale_artifacts(&self.target);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            "update coordinator started (current {}, every {:?})",
            self.current_version, self.interval
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("update coordinator stopping");
                    break;
                }
                _ = interval.tick() => {
                    if self.tick().await {
                        // RestartPending: the production restart handle has
                        // already terminated the process; a test handle
                        // returns and the loop ends here.
                        break;
                    }
                }
            }
        }
    }

    /// Execute one update attempt.
    ///
    /// A tick arriving while a previous tick's work is still in flight is
    /// a no-op. Returns `true` when the binary was replaced and a restart
    /// was requested.
    pub async fn tick(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("update attempt already in progress, skipping tick");
            return false;
        }

        let outcome = self.attempt().await;
        self.in_flight.store(false, Ordering::SeqCst);

        match outcome {
            Ok(true) => {
                info!("binary replaced; interrupting children and restarting");
                self.restart.interrupt_children();
                self.restart.exit_process();
                true
            }
            Ok(false) => {
                self.set_state(UpdatePhase::Idle, None);
                false
            }
            Err(e) => {
                warn!("update attempt failed: {e}");
                self.set_state(UpdatePhase::Idle, Some(e.to_string()));
                false
            }
        }
    }

    /// Run the blocking check/download/verify/replace pipeline off the
    /// async executor.
    async fn attempt(&self) -> Result<bool> {
        let feed = Arc::clone(&self.feed);
        let state = Arc::clone(&self.state);
        let target = self.target.clone();
        let current = self.current_version.clone();

        tokio::task::spawn_blocking(move || {
            run_attempt(feed.as_ref(), &state, &target, &current)
        })
        .await
        .map_err(|e| WardenError::Process(format!("update task panicked: {e}")))?
    }

    fn set_state(&self, phase: UpdatePhase, error: Option<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.phase = phase;
            if error.is_some() {
                state.last_error = error;
            }
        }
    }
}

/// Whether `latest` should replace `current`.
///
/// Development builds (empty or `dev` version) never self-update. The
/// comparison is plain string inequality, not semantic ordering: a latest
/// tag that differs textually triggers an update even if it is
/// semantically older.
pub fn needs_update(current: &str, latest: &str) -> bool {
    if current.is_empty() || current == "dev" {
        return false;
    }
    current != latest
}

/// One full update attempt: check, download, verify, replace.
///
/// Returns `Ok(true)` when the binary was replaced, `Ok(false)` when no
/// update was needed.
fn run_attempt(
    feed: &dyn ReleaseFeed,
    state: &Mutex<CoordinatorState>,
    target: &Path,
    current: &str,
) -> Result<bool> {
    set_phase(state, UpdatePhase::Checking);
    if let Ok(mut s) = state.lock() {
        s.last_checked = Some(Instant::now());
    }

    let release = feed.latest_release()?;
    let latest = release.version();
    if !needs_update(current, latest) {
        debug!("no update needed (current {current}, latest {latest})");
        return Ok(false);
    }
    info!("update available: {current} -> {latest}");

    let asset = feed::resolve_asset(&release)?;

    set_phase(state, UpdatePhase::Downloading);
    let bytes = feed.download(&asset.browser_download_url)?;

    set_phase(state, UpdatePhase::Verifying);
    let manifest = feed.checksum_manifest(&release);
    let expected = manifest.digest_for(&asset.name).unwrap_or("");
    match verify::verify(&bytes, expected) {
        Verification::Verified => info!("checksum verified for {}", asset.name),
        Verification::Skipped => {
            warn!("no checksum available for {}, installing unverified", asset.name);
        }
        Verification::Mismatch { expected, actual } => {
            return Err(WardenError::ChecksumMismatch { expected, actual });
        }
    }

    set_phase(state, UpdatePhase::Replacing);
    replace::replace_binary(target, &bytes)?;

    set_phase(state, UpdatePhase::RestartPending);
    Ok(true)
}

fn set_phase(state: &Mutex<CoordinatorState>, phase: UpdatePhase) {
    if let Ok(mut s) = state.lock() {
        s.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn dev_builds_never_update() {
        assert!(!needs_update("", "v1.0.0"));
        assert!(!needs_update("dev", "v1.0.0"));
    }

    #[test]
    fn equal_versions_do_not_update() {
        assert!(!needs_update("v1.0.0", "v1.0.0"));
    }

    #[test]
    fn different_versions_update() {
        assert!(needs_update("v1.0.0", "v1.1.0"));
    }

    #[test]
    fn comparison_is_textual_not_semantic() {
        // A lexically different but semantically older tag still triggers
        // an update. Intentional: the feed's latest tag is authoritative.
        assert!(needs_update("v1.1.0", "v1.0.9"));
    }

    #[test]
    fn initial_phase_is_idle() {
        assert_eq!(UpdatePhase::default(), UpdatePhase::Idle);
    }
}
