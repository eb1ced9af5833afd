//! Release acquisition: find the latest ProxiFyre release, pick its signed
//! zip, and unpack the runtime files.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  ReleaseFetcher  │ ──▶ │   select_asset   │ ──▶ │ ArchiveInstaller │
//! │  GET .../latest  │     │  first x64/x86   │     │ download + unzip │
//! └──────────────────┘     │   signed zip     │     └──────────────────┘
//!                          └──────────────────┘              │
//!                                                            ▼
//!                                                  .exe .dll .txt .md
//!                                                  under install dir
//! ```
//!
//! Each stage has its own error enum; [`AcquisitionError`] wraps all three
//! for callers driving the whole pipeline.

pub mod error;
pub mod fetcher;
pub mod installer;
pub mod platform;

use std::path::Path;

use tracing::info;

pub use error::{AcquisitionError, FetchError, InstallError, Result, SelectionError};
pub use fetcher::{select_asset, ReleaseAsset, ReleaseDescriptor, ReleaseFetcher};
pub use installer::{extract_archive, ArchiveInstaller, InstallReport, SkippedEntry};
pub use platform::TargetPlatform;

/// Repository published releases are pulled from by default.
pub const DEFAULT_REPOSITORY: &str = "wiresock/proxifyre";

/// Fetch the latest release of `repo` and install its asset into `dest`.
///
/// # Errors
///
/// Fails at the first stage that fails; nothing is written to `dest` unless
/// the download succeeded.
pub async fn install_latest(
    fetcher: &ReleaseFetcher,
    installer: &ArchiveInstaller,
    repo: &str,
    platform: &TargetPlatform,
    dest: &Path,
) -> Result<(ReleaseDescriptor, InstallReport)> {
    let release = fetcher.fetch_latest(repo).await?;
    let asset = select_asset(&release, platform)?;
    info!(tag = %release.tag, asset = %asset.name, "Installing release asset");

    let report = installer.install_asset(asset, dest).await?;
    Ok((release, report))
}
