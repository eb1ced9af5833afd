//! Candidate directories and the authoritative configuration path.
//!
//! Two directories matter to the manager: the process working directory and
//! the directory holding the manager's own executable. The latter is the
//! installation target: ProxiFyre and `app-config.json` are expected to live
//! there.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// File name of the configuration consumed by ProxiFyre.
pub const CONFIG_FILE_NAME: &str = "app-config.json";

/// File name of the supervised executable.
pub const BINARY_NAME: &str = "ProxiFyre.exe";

/// Advisory failure while colocating the configuration file.
///
/// Never fatal; callers log it and carry on.
#[derive(Debug, Error)]
pub enum ColocationWarning {
    #[error("Failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What `ensure_config_colocated` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColocationOutcome {
    /// Working directory and executable directory are the same.
    SameDirectory,
    /// No configuration in the working directory; nothing to copy.
    NoSourceConfig,
    /// The executable directory already holds an identical copy.
    AlreadyCurrent,
    /// The configuration was copied into the executable directory.
    Copied,
}

/// Result of the startup colocation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColocationReport {
    pub outcome: ColocationOutcome,
    /// Whether ProxiFyre was found in the executable directory.
    pub binary_present: bool,
}

/// Resolves the working directory, the executable directory and the
/// configuration path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    current_dir: PathBuf,
    executable_dir: PathBuf,
}

impl PathResolver {
    /// Resolve both directories from the running process.
    ///
    /// An undeterminable working directory falls back to `.`; an
    /// undeterminable executable location falls back to the working
    /// directory.
    #[must_use]
    pub fn detect() -> Self {
        let current_dir = std::env::current_dir().unwrap_or_else(|e| {
            debug!(error = %e, "Cannot determine working directory, using '.'");
            PathBuf::from(".")
        });

        let executable_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| current_dir.clone());

        Self {
            current_dir,
            executable_dir,
        }
    }

    /// Build a resolver over explicit directories.
    pub fn new(current_dir: impl Into<PathBuf>, executable_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: current_dir.into(),
            executable_dir: executable_dir.into(),
        }
    }

    pub fn current_directory(&self) -> &Path {
        &self.current_dir
    }

    pub fn executable_directory(&self) -> &Path {
        &self.executable_dir
    }

    /// The directory ProxiFyre is installed into.
    pub fn installation_target(&self) -> &Path {
        &self.executable_dir
    }

    /// Directories searched for the binary, in priority order.
    pub fn candidate_dirs(&self) -> [&Path; 2] {
        [&self.current_dir, &self.executable_dir]
    }

    /// Full path of `app-config.json` in the executable directory.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.executable_dir.join(CONFIG_FILE_NAME)
    }

    /// Copy a configuration left in the working directory next to the
    /// executable, and check whether ProxiFyre is installed there.
    ///
    /// # Errors
    ///
    /// Returns a [`ColocationWarning`] if the copy was needed but failed.
    /// Callers should log it; startup continues either way.
    pub fn ensure_config_colocated(&self) -> Result<ColocationReport, ColocationWarning> {
        let binary_present = self.executable_dir.join(BINARY_NAME).is_file();
        let dir = self.executable_dir.display();
        if binary_present {
            debug!(dir = %dir, "{BINARY_NAME} present in executable directory");
        } else {
            info!(dir = %dir, "{BINARY_NAME} not installed in executable directory yet");
        }

        let outcome = self.colocate_config()?;
        Ok(ColocationReport {
            outcome,
            binary_present,
        })
    }

    fn colocate_config(&self) -> Result<ColocationOutcome, ColocationWarning> {
        if self.current_dir == self.executable_dir {
            return Ok(ColocationOutcome::SameDirectory);
        }

        let source = self.current_dir.join(CONFIG_FILE_NAME);
        if !source.is_file() {
            return Ok(ColocationOutcome::NoSourceConfig);
        }

        let data = std::fs::read(&source).map_err(|e| ColocationWarning::Read {
            path: source.clone(),
            source: e,
        })?;

        let target = self.config_path();
        if std::fs::read(&target).is_ok_and(|existing| existing == data) {
            return Ok(ColocationOutcome::AlreadyCurrent);
        }

        std::fs::write(&target, &data).map_err(|e| ColocationWarning::Write {
            path: target.clone(),
            source: e,
        })?;

        info!(
            from = %source.display(),
            to = %target.display(),
            "Copied configuration into executable directory"
        );
        Ok(ColocationOutcome::Copied)
    }
}
