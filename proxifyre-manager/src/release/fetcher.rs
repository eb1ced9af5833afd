//! Latest-release discovery against the GitHub releases API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{FetchError, SelectionError};
use super::platform::TargetPlatform;

/// Base URL of the GitHub REST API.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Upper bound on a release index query.
pub const INDEX_TIMEOUT: Duration = Duration::from_secs(30);

/// The index rejects anonymous clients without a user agent.
pub const USER_AGENT: &str = "Mozilla/5.0";

pub const ACCEPT_GITHUB_JSON: &str = "application/vnd.github.v3+json";

/// Asset name fragments that qualify a release asset, matched on the
/// lowercased name.
pub const ASSET_MARKERS: [&str; 2] = ["x64-signed.zip", "x86-signed.zip"];

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReleaseAsset {
    pub name: String,

    #[serde(rename = "browser_download_url")]
    pub download_url: String,

    /// `sha256:<hex>` digest, when the index publishes one.
    #[serde(default)]
    pub digest: Option<String>,
}

/// The parts of a release the manager cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReleaseDescriptor {
    #[serde(rename = "tag_name")]
    pub tag: String,

    /// Assets in the order the index returned them.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseDescriptor {
    /// Decode a release document.
    pub fn from_json(body: &[u8]) -> Result<Self, FetchError> {
        serde_json::from_slice(body).map_err(|source| FetchError::MalformedResponse { source })
    }
}

/// Queries the release index.
#[derive(Debug, Clone)]
pub struct ReleaseFetcher {
    client: reqwest::Client,
    api_base: String,
}

impl Default for ReleaseFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseFetcher {
    /// Fetcher against the public GitHub API.
    pub fn new() -> Self {
        Self::with_api_base(GITHUB_API_BASE)
    }

    /// Fetcher against an alternate API root, e.g. a GitHub Enterprise host.
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the latest-release document for `owner/repo`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRepository`] unless `repo` is exactly two
    /// non-empty segments.
    pub fn latest_release_url(&self, repo: &str) -> Result<String, FetchError> {
        let mut segments = repo.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(
                format!("{}/repos/{owner}/{name}/releases/latest", self.api_base),
            ),
            _ => Err(FetchError::InvalidRepository(repo.to_string())),
        }
    }

    /// Fetch the latest published release of `repo`.
    ///
    /// Issues one GET bounded by [`INDEX_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// - [`FetchError::NetworkFailure`] on transport errors
    /// - [`FetchError::BadStatus`] on a non-2xx response
    /// - [`FetchError::MalformedResponse`] if the body is not a release
    pub async fn fetch_latest(&self, repo: &str) -> Result<ReleaseDescriptor, FetchError> {
        let url = self.latest_release_url(repo)?;
        info!(url = %url, "Querying release index");

        let network = |source| FetchError::NetworkFailure {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT_GITHUB_JSON)
            .timeout(INDEX_TIMEOUT)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        let body = response.bytes().await.map_err(network)?;
        let release = ReleaseDescriptor::from_json(&body)?;
        info!(tag = %release.tag, assets = release.assets.len(), "Found release");
        Ok(release)
    }
}

/// Pick the asset to install.
///
/// Returns the first asset, in index order, whose lowercased name contains
/// one of [`ASSET_MARKERS`]. The platform hint never changes the pick; a
/// mismatch with the host architecture is only logged.
///
/// # Errors
///
/// Returns [`SelectionError::NoMatchingAsset`] if no asset qualifies.
pub fn select_asset<'a>(
    release: &'a ReleaseDescriptor,
    platform: &TargetPlatform,
) -> Result<&'a ReleaseAsset, SelectionError> {
    let asset = release
        .assets
        .iter()
        .find(|asset| {
            let name = asset.name.to_lowercase();
            ASSET_MARKERS.iter().any(|marker| name.contains(marker))
        })
        .ok_or_else(|| SelectionError::NoMatchingAsset {
            tag: release.tag.clone(),
            asset_count: release.assets.len(),
        })?;

    if platform.matches_asset(&asset.name) {
        debug!(asset = %asset.name, "Selected release asset");
    } else {
        warn!(
            asset = %asset.name,
            platform = %platform,
            "Selected asset does not match host architecture"
        );
    }

    Ok(asset)
}
