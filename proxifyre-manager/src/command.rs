//! OS command invocation seam.
//!
//! Everything that shells out (`taskkill`, `sc query`, the ProxiFyre service
//! subcommands and the detached launch) goes through [`CommandRunner`], so the
//! Windows-only branches of the supervisor and service controller can be
//! driven on any host.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

/// `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// The host family the lifecycle commands are issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPlatform {
    /// Windows, where ProxiFyre and its service integration live.
    Windows,
    /// Any other OS. Lifecycle commands that need the Windows tooling are
    /// reported as unsupported.
    Other,
}

impl HostPlatform {
    /// Detect the platform this binary was compiled for.
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A program invocation: executable, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Human-readable reason for a non-zero exit.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        let code = self
            .code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        if detail.is_empty() {
            format!("exit code {code}")
        } else {
            format!("exit code {code}: {detail}")
        }
    }
}

/// Executes OS commands on behalf of the supervisor and service controller.
pub trait CommandRunner: Send + Sync {
    /// Run a command synchronously and capture its output.
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;

    /// Start a command in the background and return its process id.
    ///
    /// The caller does not keep a handle to the child.
    fn spawn_detached(&self, spec: &CommandSpec) -> io::Result<u32>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        debug!(command = %spec, "Running command");
        let output = Self::command(spec).stdin(Stdio::null()).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> io::Result<u32> {
        debug!(command = %spec, "Spawning detached process");
        let mut child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();

        // Reap in the background so the child does not linger as a zombie
        // while this process is still alive.
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(pid)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory runner that records invocations and replays scripted results.

    use super::{CommandOutput, CommandRunner, CommandSpec};
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct FakeRunner {
        pub(crate) calls: Mutex<Vec<CommandSpec>>,
        outputs: Mutex<VecDeque<io::Result<CommandOutput>>>,
        spawn_results: Mutex<VecDeque<io::Result<u32>>>,
    }

    impl FakeRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn push_output(&self, output: io::Result<CommandOutput>) {
            if let Ok(mut outputs) = self.outputs.lock() {
                outputs.push_back(output);
            }
        }

        pub(crate) fn push_success(&self, stdout: &str) {
            self.push_output(Ok(CommandOutput {
                success: true,
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }));
        }

        pub(crate) fn push_exit(&self, code: i32, stderr: &str) {
            self.push_output(Ok(CommandOutput {
                success: false,
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }));
        }

        pub(crate) fn push_spawn(&self, result: io::Result<u32>) {
            if let Ok(mut results) = self.spawn_results.lock() {
                results.push_back(result);
            }
        }

        pub(crate) fn recorded(&self) -> Vec<CommandSpec> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn record(&self, spec: &CommandSpec) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(spec.clone());
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
            self.record(spec);
            self.outputs
                .lock()
                .ok()
                .and_then(|mut o| o.pop_front())
                .unwrap_or_else(|| Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    ..CommandOutput::default()
                }))
        }

        fn spawn_detached(&self, spec: &CommandSpec) -> io::Result<u32> {
            self.record(spec);
            self.spawn_results
                .lock()
                .ok()
                .and_then(|mut r| r.pop_front())
                .unwrap_or(Ok(4242))
        }
    }
}
