//! Asset download, verification, and filtered extraction.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::InstallError;
use super::fetcher::{ReleaseAsset, USER_AGENT};

/// Entry extensions copied out of a release archive. Everything else is
/// ignored.
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".exe", ".dll", ".txt", ".md"];

const SCRATCH_PREFIX: &str = "proxifyre-download";
const ARCHIVE_FILE_NAME: &str = "proxifyre.zip";

/// An allow-listed archive entry that was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: String,
}

/// Outcome of a successful extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Files written under the installation directory.
    pub extracted: Vec<PathBuf>,
    /// Allow-listed entries that failed individually.
    pub skipped: Vec<SkippedEntry>,
}

impl InstallReport {
    #[must_use]
    pub fn extracted_count(&self) -> usize {
        self.extracted.len()
    }

    fn skip(&mut self, name: impl Into<String>, reason: impl ToString) {
        let name = name.into();
        let reason = reason.to_string();
        warn!(entry = %name, reason = %reason, "Skipping archive entry");
        self.skipped.push(SkippedEntry { name, reason });
    }
}

/// Why a single entry could not be written.
#[derive(Debug, Error)]
enum EntryError {
    #[error("path escapes installation directory")]
    Escapes,

    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot open entry: {0}")]
    Open(zip::result::ZipError),

    #[error("copy failed: {0}")]
    Copy(std::io::Error),

    #[error("cannot replace {path}: {source}")]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Downloads release archives and unpacks the allow-listed files.
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    client: reqwest::Client,
    scratch_root: Option<PathBuf>,
    show_progress: bool,
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveInstaller {
    /// Create a new installer using the system temp directory for scratch
    /// space.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            scratch_root: None,
            show_progress: false,
        }
    }

    /// Create scratch directories under `root` instead of the system temp
    /// directory.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Draw a progress bar while downloading.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Download and install a release asset, verifying its digest when the
    /// index published one.
    pub async fn install_asset(
        &self,
        asset: &ReleaseAsset,
        install_dir: &Path,
    ) -> Result<InstallReport, InstallError> {
        self.install_from(&asset.download_url, asset.digest.as_deref(), install_dir)
            .await
    }

    /// Download the archive at `url` and extract it into `install_dir`.
    ///
    /// # Process
    ///
    /// 1. Create a scratch directory (removed on every exit path)
    /// 2. Stream the archive into it
    /// 3. Open it as a zip
    /// 4. Copy each allow-listed file entry under `install_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The scratch directory cannot be created
    /// - The download fails
    /// - The file is not a zip archive
    /// - No entry was extracted
    ///
    /// Individual entries that fail are skipped and listed in the report.
    pub async fn download_and_install(
        &self,
        url: &str,
        install_dir: &Path,
    ) -> Result<InstallReport, InstallError> {
        self.install_from(url, None, install_dir).await
    }

    async fn install_from(
        &self,
        url: &str,
        digest: Option<&str>,
        install_dir: &Path,
    ) -> Result<InstallReport, InstallError> {
        // Dropped, and therefore deleted, however this function exits.
        let scratch = self.scratch_dir()?;
        let archive_path = scratch.path().join(ARCHIVE_FILE_NAME);
        debug!(scratch = %scratch.path().display(), "Created scratch directory");

        info!(url = %url, "Downloading release archive");
        self.download(url, &archive_path).await?;

        if let Some(digest) = digest {
            verify_digest(&archive_path, digest)?;
        }

        info!(dest = %install_dir.display(), "Extracting release archive");
        let report = extract_archive(&archive_path, install_dir)?;
        info!(
            extracted = report.extracted_count(),
            skipped = report.skipped.len(),
            "Release archive installed"
        );
        Ok(report)
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, InstallError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|source| InstallError::Scratch { source })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), InstallError> {
        let failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            InstallError::DownloadFailed {
                url: url.to_string(),
                source,
            }
        };

        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| failed(Box::new(e)))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status()).into()));
        }

        let pb = self.progress_bar(response.content_length());

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| failed(Box::new(e)))?;

        while let Some(chunk) = response.chunk().await.map_err(|e| failed(Box::new(e)))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| failed(Box::new(e)))?;
            if let Some(ref bar) = pb {
                bar.inc(chunk.len() as u64);
            }
        }
        file.flush().await.map_err(|e| failed(Box::new(e)))?;

        if let Some(ref bar) = pb {
            bar.finish_with_message("Downloaded");
        }
        Ok(())
    }

    fn progress_bar(&self, total_size: Option<u64>) -> Option<ProgressBar> {
        let total_size = total_size.filter(|size| *size > 0 && self.show_progress)?;
        let bar = ProgressBar::new(total_size);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(bar)
    }
}

/// Check a file against a `sha256:<hex>` digest.
///
/// Digests using any other algorithm are not checked.
pub fn verify_digest(file: &Path, digest: &str) -> Result<(), InstallError> {
    let Some(expected) = digest.strip_prefix("sha256:") else {
        debug!(digest = %digest, "Unsupported digest algorithm, skipping verification");
        return Ok(());
    };

    let bytes = std::fs::read(file).map_err(|e| InstallError::CorruptArchive {
        path: file.display().to_string(),
        source: Box::new(e),
    })?;
    let actual = hex::encode(Sha256::digest(&bytes));

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(InstallError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    debug!(sha256 = %actual, "Archive digest verified");
    Ok(())
}

/// Whether an entry name carries an extension from [`ALLOWED_EXTENSIONS`].
#[must_use]
pub fn is_allow_listed(name: &str) -> bool {
    let name = name.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Resolve an entry name to a relative path that stays inside the
/// installation directory.
///
/// Both `/` and `\` separate components. Returns `None` for absolute
/// names, drive prefixes, and `..` that would climb above the root.
#[must_use]
pub fn contained_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                // `C:` is a plain component on non-Windows hosts.
                if part.to_string_lossy().contains(':') {
                    return None;
                }
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}

/// Extract the allow-listed files of a zip archive into `dest`.
///
/// Directory entries and names outside the allow-list are ignored. Entries
/// that fail on their own (unsafe path, unreadable entry, unwritable
/// destination) are skipped and recorded in [`InstallReport::skipped`].
///
/// # Errors
///
/// - [`InstallError::CorruptArchive`] if `archive` is not a readable zip
/// - [`InstallError::NothingExtracted`] if no entry was written
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<InstallReport, InstallError> {
    let corrupt = |source: Box<dyn std::error::Error + Send + Sync>| InstallError::CorruptArchive {
        path: archive.display().to_string(),
        source,
    };

    let file = File::open(archive).map_err(|e| corrupt(Box::new(e)))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(Box::new(e)))?;

    let mut report = InstallReport::default();
    for index in 0..zip.len() {
        // Raw access reads the header only, so entries that are filtered out
        // are never decrypted or decompressed.
        let name = match zip.by_index_raw(index) {
            Ok(entry) if entry.is_dir() => continue,
            Ok(entry) => entry.name().to_string(),
            Err(e) => {
                report.skip(format!("entry #{index}"), e);
                continue;
            }
        };

        if !is_allow_listed(&name) {
            continue;
        }

        match write_entry(&mut zip, index, &name, dest) {
            Ok(path) => {
                debug!(entry = %name, path = %path.display(), "Extracted file");
                report.extracted.push(path);
            }
            Err(e) => report.skip(name, e),
        }
    }

    if report.extracted.is_empty() {
        return Err(InstallError::NothingExtracted {
            skipped: report.skipped,
        });
    }
    Ok(report)
}

fn write_entry<R: Read + Seek>(
    zip: &mut zip::ZipArchive<R>,
    index: usize,
    name: &str,
    dest: &Path,
) -> Result<PathBuf, EntryError> {
    let relative = contained_path(name).ok_or(EntryError::Escapes)?;
    let target = dest.join(relative);
    let mut entry = zip.by_index(index).map_err(EntryError::Open)?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|source| EntryError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // An existing file is only replaced once the entry was copied in full.
    let partial = partial_path(&target);
    let mut out = File::create(&partial).map_err(|source| EntryError::CreateFile {
        path: partial.clone(),
        source,
    })?;
    let copied = std::io::copy(&mut entry, &mut out).and_then(|_| out.flush());
    drop(out);
    if let Err(e) = copied {
        let _ = std::fs::remove_file(&partial);
        return Err(EntryError::Copy(e));
    }

    std::fs::rename(&partial, &target).map_err(|source| {
        let _ = std::fs::remove_file(&partial);
        EntryError::Replace {
            path: target.clone(),
            source,
        }
    })?;
    Ok(target)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}
