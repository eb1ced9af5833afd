//! Error types for release acquisition.

use thiserror::Error;

use super::installer::SkippedEntry;

/// Errors querying the release index.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The repository identifier is not `owner/repo`.
    #[error("Invalid repository '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// Transport failure: DNS, connect, TLS, timeout, truncated body.
    #[error("Release index request to {url} failed: {source}")]
    NetworkFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The index answered with a non-2xx status.
    #[error("Release index returned HTTP {status} for {url}")]
    BadStatus { status: u16, url: String },

    /// The body is not a release document.
    #[error("Release index response could not be decoded: {source}")]
    MalformedResponse {
        #[source]
        source: serde_json::Error,
    },
}

/// No asset of the release qualifies for download.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Release {tag} has no signed x64/x86 zip among its {asset_count} asset(s)")]
    NoMatchingAsset { tag: String, asset_count: usize },
}

/// Errors downloading and unpacking a release asset.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Failed to create scratch directory: {source}")]
    Scratch {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download {url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Failed to open archive at {path}: {source}")]
    CorruptArchive {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Not a single allow-listed entry made it to disk.
    #[error("No files were extracted (skipped: {})", .skipped.len())]
    NothingExtracted { skipped: Vec<SkippedEntry> },
}

/// Any failure of the fetch → select → install pipeline.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

/// Result type for the acquisition pipeline.
pub type Result<T> = std::result::Result<T, AcquisitionError>;
