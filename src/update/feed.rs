//! Release feed client.
//!
//! Fetches latest-release metadata and the optional checksum manifest
//! from a fixed remote index, and resolves the download asset for the
//! running platform.

use crate::error::{Result, WardenError};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

/// Fixed latest-release endpoint for warden builds.
pub const DEFAULT_FEED_URL: &str =
    "https://api.github.com/repos/warden-sh/warden/releases/latest";

/// Literal prefix on release tags; stripped to yield `vX.Y.Z`.
pub const TAG_PREFIX: &str = "warden-";

/// Name of the newline-delimited checksum manifest asset.
pub const CHECKSUM_ASSET: &str = "checksums.txt";

/// Latest-release metadata. Produced fresh on every poll and discarded
/// after use.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    /// Release tag (e.g. `warden-v1.2.0`).
    pub tag_name: String,
    /// Downloadable assets.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    /// Version string with the literal tag prefix stripped (`vX.Y.Z`).
    pub fn version(&self) -> &str {
        self.tag_name
            .strip_prefix(TAG_PREFIX)
            .unwrap_or(&self.tag_name)
    }

    /// Find an asset by exact filename.
    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// A single downloadable release asset.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// Asset filename (e.g. `warden-linux-x64`).
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
}

/// Expected hex digests keyed by asset filename.
///
/// A missing entry only reduces safety; it never blocks an update.
#[derive(Debug, Clone, Default)]
pub struct ChecksumManifest {
    digests: HashMap<String, String>,
}

impl ChecksumManifest {
    /// Parse the `<hex-digest>  <filename>` line format. Lines that do
    /// not fit are skipped.
    pub fn parse(text: &str) -> Self {
        let mut digests = HashMap::new();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            if let (Some(digest), Some(name)) = (parts.next(), parts.next()) {
                digests.insert(name.to_owned(), digest.to_ascii_lowercase());
            }
        }
        Self { digests }
    }

    /// Expected digest for an asset, if the manifest lists one.
    pub fn digest_for(&self, asset_name: &str) -> Option<&str> {
        self.digests.get(asset_name).map(String::as_str)
    }

    /// Whether the manifest carries no entries at all.
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Read-only view of the remote release index.
///
/// The seam that lets the update coordinator run against a fake feed in
/// tests.
pub trait ReleaseFeed: Send + Sync {
    /// Fetch the latest release metadata.
    ///
    /// # Errors
    ///
    /// `Network` on transport failure, `Parse` on a malformed response,
    /// `NotFound` when the index returns a non-success status.
    fn latest_release(&self) -> Result<ReleaseInfo>;

    /// Fetch the checksum manifest for a release.
    ///
    /// Best-effort: any failure yields an empty manifest and the caller
    /// skips verification.
    fn checksum_manifest(&self, release: &ReleaseInfo) -> ChecksumManifest;

    /// Download an asset in full.
    fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP release feed backed by a GitHub-style latest-release endpoint.
pub struct HttpReleaseFeed {
    agent: ureq::Agent,
    feed_url: String,
    user_agent: String,
}

impl HttpReleaseFeed {
    /// Create a feed client for the given endpoint. `version` is the
    /// running version, reported in the User-Agent header.
    pub fn new(feed_url: impl Into<String>, version: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .timeout_read(Duration::from_secs(300))
            .build();

        Self {
            agent,
            feed_url: feed_url.into(),
            user_agent: format!("warden/{version} (self-update)"),
        }
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        match self.agent.get(url).set("User-Agent", &self.user_agent).call() {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, _)) => Err(WardenError::NotFound(format!(
                "{url} returned status {code}"
            ))),
            Err(e) => Err(WardenError::Network(e.to_string())),
        }
    }
}

impl ReleaseFeed for HttpReleaseFeed {
    fn latest_release(&self) -> Result<ReleaseInfo> {
        let resp = self.get(&self.feed_url)?;
        let text = resp
            .into_string()
            .map_err(|e| WardenError::Network(format!("release read failed: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| WardenError::Parse(format!("malformed release JSON: {e}")))
    }

    fn checksum_manifest(&self, release: &ReleaseInfo) -> ChecksumManifest {
        let Some(asset) = release.find_asset(CHECKSUM_ASSET) else {
            tracing::debug!("release {} has no {CHECKSUM_ASSET} asset", release.tag_name);
            return ChecksumManifest::default();
        };

        let text = self.get(&asset.browser_download_url).and_then(|resp| {
            resp.into_string()
                .map_err(|e| WardenError::Network(format!("manifest read failed: {e}")))
        });

        match text {
            Ok(text) => ChecksumManifest::parse(&text),
            Err(e) => {
                tracing::warn!("cannot fetch checksum manifest: {e}");
                ChecksumManifest::default()
            }
        }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.get(url)?;
        let mut bytes = Vec::new();
        resp.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| WardenError::Network(format!("download read failed: {e}")))?;
        Ok(bytes)
    }
}

/// Expected release asset name for the running platform
/// (`warden-<os>-<arch>[.exe]`).
pub fn platform_asset_name() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => Some("warden-darwin-arm64"),
        ("macos", "x86_64") => Some("warden-darwin-x64"),
        ("linux", "x86_64") => Some("warden-linux-x64"),
        ("linux", "aarch64") => Some("warden-linux-arm64"),
        ("windows", "x86_64") => Some("warden-windows-x64.exe"),
        _ => None,
    }
}

/// Select the asset matching the running platform.
///
/// # Errors
///
/// `AssetNotFound` when the release carries no matching asset. This is a
/// packaging gap rather than a transient fault, so the caller aborts the
/// attempt instead of falling back.
pub fn resolve_asset(release: &ReleaseInfo) -> Result<&ReleaseAsset> {
    let expected = platform_asset_name().ok_or_else(|| {
        WardenError::AssetNotFound(format!(
            "unsupported platform {}-{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    })?;

    release.find_asset(expected).ok_or_else(|| {
        WardenError::AssetNotFound(format!(
            "release {} has no asset named {expected}",
            release.tag_name
        ))
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn release_with_assets(names: &[&str]) -> ReleaseInfo {
        ReleaseInfo {
            tag_name: "warden-v1.2.0".to_owned(),
            assets: names
                .iter()
                .map(|n| ReleaseAsset {
                    name: (*n).to_owned(),
                    browser_download_url: format!("https://example.com/{n}"),
                })
                .collect(),
        }
    }

    #[test]
    fn version_strips_tag_prefix() {
        let release = release_with_assets(&[]);
        assert_eq!(release.version(), "v1.2.0");
    }

    #[test]
    fn version_passes_through_unprefixed_tag() {
        let release = ReleaseInfo {
            tag_name: "v1.2.0".to_owned(),
            assets: vec![],
        };
        assert_eq!(release.version(), "v1.2.0");
    }

    #[test]
    fn find_asset_matches_exact_name() {
        let release = release_with_assets(&["warden-linux-x64", "checksums.txt"]);
        assert!(release.find_asset("checksums.txt").is_some());
        assert!(release.find_asset("warden-linux-arm64").is_none());
    }

    #[test]
    fn platform_asset_name_matches_tool_prefix() {
        if let Some(name) = platform_asset_name() {
            assert!(name.starts_with("warden-"));
        }
    }

    #[test]
    fn resolve_asset_finds_platform_build() {
        let Some(expected) = platform_asset_name() else {
            return;
        };
        let release = release_with_assets(&[expected, "checksums.txt"]);
        let asset = resolve_asset(&release).unwrap();
        assert_eq!(asset.name, expected);
    }

    #[test]
    fn resolve_asset_fails_on_empty_release() {
        let release = release_with_assets(&[]);
        let err = resolve_asset(&release).unwrap_err();
        assert!(matches!(err, WardenError::AssetNotFound(_)), "got {err}");
    }

    #[test]
    fn manifest_parses_two_space_format() {
        let manifest = ChecksumManifest::parse(
            "0f343b0931126a20f133d67c2b018a3b  warden-linux-x64\n\
             ABCDEF0123456789  warden-darwin-arm64\n",
        );
        assert_eq!(
            manifest.digest_for("warden-linux-x64"),
            Some("0f343b0931126a20f133d67c2b018a3b")
        );
        // Digests are normalised to lowercase.
        assert_eq!(
            manifest.digest_for("warden-darwin-arm64"),
            Some("abcdef0123456789")
        );
    }

    #[test]
    fn manifest_skips_malformed_lines() {
        let manifest = ChecksumManifest::parse("justonefield\n\nabc  good\n");
        assert_eq!(manifest.digest_for("good"), Some("abc"));
        assert_eq!(manifest.digest_for("justonefield"), None);
    }

    #[test]
    fn empty_manifest_has_no_digests() {
        let manifest = ChecksumManifest::default();
        assert!(manifest.is_empty());
        assert_eq!(manifest.digest_for("anything"), None);
    }

    #[test]
    fn release_json_deserializes_github_shape() {
        let json = r#"{
            "tag_name": "warden-v2.0.0",
            "html_url": "https://example.com/releases/warden-v2.0.0",
            "assets": [
                {"name": "warden-linux-x64", "browser_download_url": "https://example.com/dl", "size": 123}
            ]
        }"#;
        let release: ReleaseInfo = serde_json::from_str(json).unwrap();
        assert_eq!(release.version(), "v2.0.0");
        assert_eq!(release.assets.len(), 1);
    }

    #[test]
    fn release_json_tolerates_missing_assets() {
        let release: ReleaseInfo =
            serde_json::from_str(r#"{"tag_name": "warden-v2.0.0"}"#).unwrap();
        assert!(release.assets.is_empty());
    }
}
