//! ProxiFyre's Windows service registration.
//!
//! ProxiFyre installs and controls its own service through subcommands
//! (`ProxiFyre.exe install`, `start`, ...). Status comes from the service
//! control manager via `sc query`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec, HostPlatform, SystemRunner};
use crate::paths::{PathResolver, BINARY_NAME};

/// Name ProxiFyre registers its service under.
pub const SERVICE_NAME: &str = "ProxiFyre";

/// State of the ProxiFyre service as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Running,
    Stopped,
    /// The service is not registered, or the query could not be made.
    NotFound,
    /// The query succeeded but reported neither running nor stopped, e.g. a
    /// pending transition.
    Unknown,
    /// Services are only managed on Windows.
    UnsupportedPlatform,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::NotFound => "not installed",
            Self::Unknown => "unknown",
            Self::UnsupportedPlatform => "unsupported on this platform",
        };
        f.write_str(label)
    }
}

/// Service subcommands understood by ProxiFyre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    Install,
    Uninstall,
    Start,
    Stop,
}

impl ServiceCommand {
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Service command errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{binary} not found in {}", .dir.display())]
    NotFound { binary: String, dir: PathBuf },

    #[error("`{command}` failed: {cause}")]
    CommandFailed { command: String, cause: String },
}

/// Interpret `sc query` output.
///
/// `RUNNING` is checked first; anything without either marker is
/// [`ServiceStatus::Unknown`].
#[must_use]
pub fn parse_service_status(output: &str) -> ServiceStatus {
    if output.contains("RUNNING") {
        ServiceStatus::Running
    } else if output.contains("STOPPED") {
        ServiceStatus::Stopped
    } else {
        ServiceStatus::Unknown
    }
}

/// Drives ProxiFyre's service subcommands.
#[derive(Clone)]
pub struct ServiceController {
    paths: PathResolver,
    runner: Arc<dyn CommandRunner>,
    platform: HostPlatform,
}

impl ServiceController {
    #[must_use]
    pub fn new(paths: PathResolver) -> Self {
        Self::with_runner(paths, Arc::new(SystemRunner), HostPlatform::detect())
    }

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

    pub fn install(&self) -> Result<(), ServiceError> {
        self.invoke(ServiceCommand::Install)
    }

    pub fn uninstall(&self) -> Result<(), ServiceError> {
        self.invoke(ServiceCommand::Uninstall)
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.invoke(ServiceCommand::Start)
    }

    pub fn stop(&self) -> Result<(), ServiceError> {
        self.invoke(ServiceCommand::Stop)
    }

    /// Run `ProxiFyre.exe <command>` from the working directory and wait for
    /// it to exit.
    ///
    /// Only the working directory is searched for the binary.
    pub fn invoke(&self, command: ServiceCommand) -> Result<(), ServiceError> {
        let dir = self.paths.current_directory();
        let binary = dir.join(BINARY_NAME);
        if !binary.is_file() {
            return Err(ServiceError::NotFound {
                binary: BINARY_NAME.to_string(),
                dir: dir.to_path_buf(),
            });
        }

        let spec = CommandSpec::new(&binary)
            .arg(command.as_arg())
            .current_dir(dir);
        let failed = |cause: String| ServiceError::CommandFailed {
            command: format!("{BINARY_NAME} {command}"),
            cause,
        };

        let output = self.runner.run(&spec).map_err(|e| failed(e.to_string()))?;
        if !output.success {
            return Err(failed(output.failure_reason()));
        }

        info!(command = %command, "Service command completed");
        Ok(())
    }

    /// Query the service control manager. Never fails.
    pub fn status(&self) -> ServiceStatus {
        if !self.platform.is_windows() {
            return ServiceStatus::UnsupportedPlatform;
        }

        let spec = CommandSpec::new("sc").args(["query", SERVICE_NAME]);
        match self.runner.run(&spec) {
            Ok(output) if output.success => parse_service_status(&output.stdout),
            Ok(output) => {
                debug!(reason = %output.failure_reason(), "Service query failed");
                ServiceStatus::NotFound
            }
            Err(e) => {
                debug!(error = %e, "Service query could not be run");
                ServiceStatus::NotFound
            }
        }
    }
}
