//! Error types for the warden supervisor.

/// Top-level error type for service lifecycle management and the
/// self-update pipeline.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// Transport-level failure talking to the release feed. Transient;
    /// the next coordinator tick retries.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed release feed response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The release index returned a non-success status.
    #[error("release not found: {0}")]
    NotFound(String),

    /// No release asset matches this platform. A packaging gap, not a
    /// transient fault.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// Downloaded bytes do not match the manifest digest. The artifact is
    /// discarded and the next tick retries from scratch.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest listed in the checksum manifest.
        expected: String,
        /// Digest computed over the downloaded bytes.
        actual: String,
    },

    /// Binary replacement failure. The pre-existing binary stays intact.
    #[error("replace error: {0}")]
    Replace(String),

    /// `install` requested but the service is already registered.
    #[error("service is already installed")]
    AlreadyInstalled,

    /// `uninstall` requested but the service is not registered.
    #[error("service is not installed")]
    NotInstalled,

    /// `start` requested but the service is already running.
    #[error("service is already running")]
    AlreadyRunning,

    /// `stop` requested but the service is already stopped.
    #[error("service is already stopped")]
    AlreadyStopped,

    /// Host service-manager invocation failure.
    #[error("service manager error: {0}")]
    Service(String),

    /// Child process spawn or signal failure.
    #[error("process error: {0}")]
    Process(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, WardenError>;
