//! Discovery, launch and termination of the ProxiFyre executable.
//!
//! The supervisor holds no process state. A launch is fire-and-forget and
//! termination goes by executable name, so every call re-derives what it
//! needs from the filesystem and the OS. ProxiFyre may also be running as a
//! service that this process never started.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec, HostPlatform, SystemRunner};
use crate::paths::{PathResolver, BINARY_NAME};

/// ProxiFyre was found in none of the candidate directories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{binary} not found in {}", format_searched(.searched))]
pub struct BinaryNotFound {
    pub binary: String,
    pub searched: Vec<PathBuf>,
}

fn format_searched(searched: &[PathBuf]) -> String {
    searched
        .iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Launch errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    NotFound(#[from] BinaryNotFound),

    #[error("Failed to start {path}: {source}")]
    StartFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Termination errors.
#[derive(Debug, Error)]
pub enum TerminateError {
    #[error("Stopping ProxiFyre by name is only supported on Windows (host: {0})")]
    Unsupported(HostPlatform),

    #[error("Failed to stop ProxiFyre: {0}")]
    KillFailed(String),
}

/// A process started by [`ProcessSupervisor::launch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub binary: PathBuf,
}

/// Locates, launches and terminates ProxiFyre.
#[derive(Clone)]
pub struct ProcessSupervisor {
    paths: PathResolver,
    runner: Arc<dyn CommandRunner>,
    platform: HostPlatform,
}

impl ProcessSupervisor {
    /// Supervisor issuing real OS commands for the current host.
    #[must_use]
    pub fn new(paths: PathResolver) -> Self {
        Self::with_runner(paths, Arc::new(SystemRunner), HostPlatform::detect())
    }

    /// Supervisor with an explicit command runner and host platform.
    pub fn with_runner(
        paths: PathResolver,
        runner: Arc<dyn CommandRunner>,
        platform: HostPlatform,
    ) -> Self {
        Self {
            paths,
            runner,
            platform,
        }
    }

    /// Find the binary, preferring the working directory over the executable
    /// directory.
    pub fn locate(&self) -> Result<PathBuf, BinaryNotFound> {
        let candidates = self.paths.candidate_dirs();
        for dir in candidates {
            let path = dir.join(BINARY_NAME);
            if path.is_file() {
                debug!(path = %path.display(), "Located ProxiFyre");
                return Ok(path);
            }
        }

        Err(BinaryNotFound {
            binary: BINARY_NAME.to_string(),
            searched: candidates.iter().map(|dir| dir.to_path_buf()).collect(),
        })
    }

    /// Start ProxiFyre in the background from its own directory.
    ///
    /// The returned handle is informational only; nothing tracks the process
    /// afterwards.
    pub fn launch(&self) -> Result<ProcessHandle, LaunchError> {
        let binary = self.locate()?;
        let mut spec = CommandSpec::new(&binary);
        if let Some(dir) = binary.parent() {
            spec = spec.current_dir(dir);
        }

        let pid = self
            .runner
            .spawn_detached(&spec)
            .map_err(|source| LaunchError::StartFailed {
                path: binary.clone(),
                source,
            })?;

        info!(pid, path = %binary.display(), "Launched ProxiFyre");
        Ok(ProcessHandle { pid, binary })
    }

    /// Forcefully stop every process named `ProxiFyre.exe`.
    pub fn terminate(&self) -> Result<(), TerminateError> {
        if !self.platform.is_windows() {
            return Err(TerminateError::Unsupported(self.platform));
        }

        let spec = CommandSpec::new("taskkill").args(["/F", "/IM", BINARY_NAME]);
        let output = self
            .runner
            .run(&spec)
            .map_err(|e| TerminateError::KillFailed(e.to_string()))?;

        if !output.success {
            let reason = output.failure_reason();
            warn!(reason = %reason, "taskkill failed");
            return Err(TerminateError::KillFailed(reason));
        }

        info!("Stopped ProxiFyre");
        Ok(())
    }
}
