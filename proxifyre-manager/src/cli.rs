//! CLI commands and output formatting.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dialoguer::Confirm;
use tracing::warn;

use crate::config::{ConfigStore, ManagerConfig, ProxyRule, KNOWN_LOG_LEVELS};
use crate::paths::{PathResolver, BINARY_NAME};
use crate::release::{self, ArchiveInstaller, ReleaseFetcher, TargetPlatform, DEFAULT_REPOSITORY};
use crate::service::ServiceController;
use crate::supervisor::ProcessSupervisor;

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the directories and files the manager works with
    Paths {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download the latest ProxiFyre release and install it
    Download {
        /// GitHub repository to pull releases from
        #[arg(long, value_name = "OWNER/REPO", default_value = DEFAULT_REPOSITORY)]
        repo: String,

        /// Installation directory (default: next to this executable)
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Start ProxiFyre in the background
    Run,

    /// Stop every running ProxiFyre process
    Stop,

    /// Manage the ProxiFyre Windows service
    Service(ServiceArgs),

    /// View or edit app-config.json
    Config(ConfigArgs),
}

/// Service subcommand arguments.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub action: ServiceAction,
}

/// Service subcommands.
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ServiceAction {
    /// Register ProxiFyre as a service
    Install,

    /// Remove the service registration
    Uninstall {
        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Start the service
    Start,

    /// Stop the service
    Stop,

    /// Show the service state
    Status,
}

/// Config subcommand arguments.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands. Edits apply to the first proxy rule.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the SOCKS5 endpoint (host:port)
    SetEndpoint { endpoint: String },

    /// Set the SOCKS5 username and password
    SetCredentials { username: String, password: String },

    /// Set ProxiFyre's log level
    SetLogLevel { level: String },

    /// Route another application through the proxy
    AddApp { name: String },

    /// Stop routing an application through the proxy
    RemoveApp { name: String },

    /// Remove all applications from the proxy rule
    ClearApps,

    /// Replace the configuration with a JSON file
    Import { file: PathBuf },
}

/// Execute a command.
pub async fn execute(command: Command, paths: &PathResolver) -> Result<()> {
    match command {
        Command::Paths { json } => handle_paths(paths, json),
        Command::Download { repo, dest, yes } => handle_download(paths, repo, dest, yes).await,
        Command::Run => {
            let handle = ProcessSupervisor::new(paths.clone()).launch()?;
            eprintln!("Started {} (pid {})", handle.binary.display(), handle.pid);
            Ok(())
        }
        Command::Stop => {
            ProcessSupervisor::new(paths.clone()).terminate()?;
            eprintln!("Stopped {BINARY_NAME}");
            Ok(())
        }
        Command::Service(args) => handle_service(paths, args.action),
        Command::Config(args) => handle_config(paths, args.action),
    }
}

fn handle_paths(paths: &PathResolver, json: bool) -> Result<()> {
    let binary = ProcessSupervisor::new(paths.clone())
        .locate()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "(not found)".to_string());

    let entries = [
        ("current_dir", paths.current_directory().display().to_string()),
        ("executable_dir", paths.executable_directory().display().to_string()),
        ("config", paths.config_path().display().to_string()),
        ("binary", binary),
    ];

    if json {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();
        println!("{}", format_json(&map)?);
    } else {
        let rows = entries
            .into_iter()
            .map(|(k, v)| vec![k.to_string(), v])
            .collect();
        format_table(&["NAME", "PATH"], rows);
    }
    Ok(())
}

async fn handle_download(
    paths: &PathResolver,
    repo: String,
    dest: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let dest = dest.unwrap_or_else(|| paths.installation_target().to_path_buf());

    if !yes && is_tty() {
        let prompt = format!("Install the latest {repo} release into {}?", dest.display());
        if !confirm(&prompt)? {
            eprintln!("Download cancelled");
            return Ok(());
        }
    }

    std::fs::create_dir_all(&dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let fetcher = ReleaseFetcher::new();
    let installer = ArchiveInstaller::new().with_progress(is_tty());
    let (release, report) =
        release::install_latest(&fetcher, &installer, &repo, &TargetPlatform::detect(), &dest)
            .await?;

    eprintln!(
        "Installed {} {}: {} file(s) extracted into {}",
        repo,
        release.tag,
        report.extracted_count(),
        dest.display()
    );
    if !report.skipped.is_empty() {
        let rows = report
            .skipped
            .iter()
            .map(|s| vec![s.name.clone(), s.reason.clone()])
            .collect();
        eprintln!("Skipped entries:");
        format_table(&["ENTRY", "REASON"], rows);
    }
    Ok(())
}

fn handle_service(paths: &PathResolver, action: ServiceAction) -> Result<()> {
    let controller = ServiceController::new(paths.clone());
    match action {
        ServiceAction::Install => controller.install()?,
        ServiceAction::Uninstall { yes } => {
            if !yes && is_tty() && !confirm("Remove the ProxiFyre service?")? {
                eprintln!("Uninstall cancelled");
                return Ok(());
            }
            controller.uninstall()?;
        }
        ServiceAction::Start => controller.start()?,
        ServiceAction::Stop => controller.stop()?,
        ServiceAction::Status => {
            println!("{}", controller.status());
            return Ok(());
        }
    }
    eprintln!("Done");
    Ok(())
}

fn handle_config(paths: &PathResolver, action: ConfigAction) -> Result<()> {
    let store = ConfigStore::from_resolver(paths);

    match action {
        ConfigAction::Show { json } => {
            let config = store.load()?;
            if json {
                println!("{}", config.to_json()?);
            } else {
                print_config(&config);
            }
        }
        ConfigAction::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let config = store.save_json(&content)?;
            eprintln!(
                "Imported {} proxy rule(s) into {}",
                config.proxies.len(),
                store.path().display()
            );
        }
        edit => {
            let mut config = store.load()?;
            edit_config(&mut config, edit)?;
            store.save(&config)?;
            eprintln!("Saved {}", store.path().display());
        }
    }
    Ok(())
}

/// Apply a single-field edit to `config`.
///
/// `Show` and `Import` are not edits and leave `config` untouched.
pub fn edit_config(config: &mut ManagerConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::SetEndpoint { endpoint } => {
            ProxyRule::validate_endpoint(&endpoint)?;
            config.primary_rule_mut().socks5_endpoint = endpoint;
        }
        ConfigAction::SetCredentials { username, password } => {
            let rule = config.primary_rule_mut();
            rule.username = username;
            rule.password = password;
        }
        ConfigAction::SetLogLevel { level } => {
            if !KNOWN_LOG_LEVELS.contains(&level.as_str()) {
                warn!(level = %level, known = ?KNOWN_LOG_LEVELS, "Unrecognised log level");
            }
            config.log_level = level;
        }
        ConfigAction::AddApp { name } => {
            let rule = config.primary_rule_mut();
            if !rule.app_names.contains(&name) {
                rule.app_names.push(name);
            }
        }
        ConfigAction::RemoveApp { name } => {
            let apps = &mut config.primary_rule_mut().app_names;
            let before = apps.len();
            apps.retain(|app| app != &name);
            if apps.len() == before {
                warn!(app = %name, "Application was not in the proxy rule");
            }
        }
        ConfigAction::ClearApps => config.primary_rule_mut().app_names.clear(),
        ConfigAction::Show { .. } | ConfigAction::Import { .. } => {}
    }
    Ok(())
}

fn print_config(config: &ManagerConfig) {
    eprintln!("Log level: {}", config.log_level);
    let rows = config
        .proxies
        .iter()
        .map(|rule| {
            vec![
                rule.socks5_endpoint.clone(),
                rule.username.clone(),
                rule.supported_protocols.join(","),
                rule.app_names.join(","),
            ]
        })
        .collect();
    format_table(&["ENDPOINT", "USERNAME", "PROTOCOLS", "APPS"], rows);
}

/// Check if stdout is a TTY.
fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Prompt user for confirmation.
fn confirm(prompt: &str) -> Result<bool> {
    let result = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(result)
}

/// Format and print a table to stdout.
fn format_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        eprintln!("No items found");
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(headers.to_vec()));
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", separator.join("  "));
    for row in &rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}

/// Format data as JSON.
fn format_json<T: serde::Serialize>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}
