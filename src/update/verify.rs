//! Download integrity verification.

use sha2::{Digest, Sha256};

/// Outcome of comparing downloaded bytes against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Digest matched.
    Verified,
    /// No expected digest was available; the artifact is unverifiable.
    /// Callers log this, they do not abort.
    Skipped,
    /// Digest mismatch. Fatal for this attempt; the artifact is
    /// discarded and the next tick retries.
    Mismatch {
        /// Digest the manifest listed.
        expected: String,
        /// Digest computed over the downloaded bytes.
        actual: String,
    },
}

impl Verification {
    /// Whether the artifact must be discarded.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Compare `bytes` against an expected lowercase-hex SHA-256 digest.
///
/// An empty `expected` skips verification rather than failing; a missing
/// manifest entry only reduces safety.
pub fn verify(bytes: &[u8], expected: &str) -> Verification {
    if expected.is_empty() {
        return Verification::Skipped;
    }

    let actual = sha256_hex(bytes);
    if actual.eq_ignore_ascii_case(expected) {
        Verification::Verified
    } else {
        Verification::Mismatch {
            expected: expected.to_ascii_lowercase(),
            actual,
        }
    }
}
