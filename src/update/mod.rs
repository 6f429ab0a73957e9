//! Self-update pipeline.
//!
//! Polls a release feed for newer builds, downloads the platform asset,
//! verifies it against a checksum manifest, and atomically replaces the
//! running executable before signalling a restart.

pub mod coordinator;
pub mod feed;
pub mod replace;
pub mod verify;

pub use coordinator::{RestartHandle, UpdateCoordinator, UpdatePhase, needs_update};
pub use feed::{ChecksumManifest, HttpReleaseFeed, ReleaseAsset, ReleaseFeed, ReleaseInfo};
pub use verify::Verification;
