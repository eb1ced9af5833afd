//! ProxiFyre manager - lifecycle management for the ProxiFyre SOCKS5
//! redirector.
//!
//! ProxiFyre is treated as an opaque Windows executable. This crate finds
//! it, fetches new releases of it, starts and stops it, and maintains the
//! `app-config.json` it reads.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          CLI driver                             │
//! └─────────────────────────────────────────────────────────────────┘
//!         │                 │                 │                │
//!         ▼                 ▼                 ▼                ▼
//!   ┌───────────┐    ┌────────────┐    ┌────────────┐    ┌──────────┐
//!   │  release  │    │ supervisor │    │  service   │    │  config  │
//!   │ fetch+zip │    │ run / kill │    │ sc, install│    │   JSON   │
//!   └───────────┘    └────────────┘    └────────────┘    └──────────┘
//!         │                 │                 │                │
//!         │                 └──── command ────┘                │
//!         ▼                                                    ▼
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │                  paths (cwd, executable dir)                    │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod paths;
pub mod release;
pub mod service;
pub mod supervisor;

pub use config::{ConfigError, ConfigStore, ManagerConfig, ProxyRule};
pub use paths::PathResolver;
pub use release::{AcquisitionError, ArchiveInstaller, InstallReport, ReleaseFetcher};
pub use service::{ServiceController, ServiceStatus};
pub use supervisor::{ProcessHandle, ProcessSupervisor};
