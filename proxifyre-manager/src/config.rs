//! Loading and saving the ProxiFyre configuration file.
//!
//! The file is JSON and lives next to the manager executable as
//! `app-config.json`. It holds a log level and an ordered list of proxy
//! rules, each routing a set of applications through one SOCKS5 endpoint.
//!
//! [`ConfigStore`] never keeps the configuration itself: `load` hands the
//! caller a [`ManagerConfig`] and `save` writes back whatever handle it is
//! given, replacing the whole file.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::paths::PathResolver;

/// Log level written for a fresh configuration.
pub const DEFAULT_LOG_LEVEL: &str = "Error";

/// Log levels understood by ProxiFyre.
pub const KNOWN_LOG_LEVELS: &[&str] = &["Error", "Warning", "Info", "Debug", "All"];

/// Protocols enabled on a fresh proxy rule.
pub const DEFAULT_PROTOCOLS: &[&str] = &["TCP", "UDP"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// One routing rule: which applications go through which SOCKS5 proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRule {
    /// Executable names (or name fragments) routed through this proxy.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub app_names: Vec<String>,

    /// `host:port` of the SOCKS5 server.
    #[serde(default, rename = "socks5ProxyEndpoint")]
    pub socks5_endpoint: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Transport protocols to redirect, e.g. `TCP`, `UDP`.
    #[serde(default = "default_protocols", deserialize_with = "null_as_default_protocols")]
    pub supported_protocols: Vec<String>,
}

fn default_protocols() -> Vec<String> {
    DEFAULT_PROTOCOLS.iter().map(|p| (*p).to_string()).collect()
}

// Go-written files carry `null` for nil slices.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_protocols<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_else(default_protocols))
}

impl Default for ProxyRule {
    fn default() -> Self {
        Self {
            app_names: Vec::new(),
            socks5_endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            supported_protocols: default_protocols(),
        }
    }
}

impl ProxyRule {
    /// Check that an endpoint looks like `host:port`.
    ///
    /// An empty endpoint is accepted; it is what a fresh configuration holds.
    pub fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
        if endpoint.is_empty() {
            return Ok(());
        }

        let Some((host, port)) = endpoint.rsplit_once(':') else {
            return Err(ConfigError::ValidationError(format!(
                "Endpoint '{endpoint}' must be in host:port form"
            )));
        };

        if host.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Endpoint '{endpoint}' has an empty host"
            )));
        }

        port.parse::<u16>().map_err(|_| {
            ConfigError::ValidationError(format!("Endpoint '{endpoint}' has an invalid port"))
        })?;

        Ok(())
    }
}

/// The persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_proxies", deserialize_with = "null_as_empty")]
    pub proxies: Vec<ProxyRule>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_proxies() -> Vec<ProxyRule> {
    vec![ProxyRule::default()]
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            proxies: default_proxies(),
        }
    }
}

impl ManagerConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: ManagerConfig = serde_json::from_str(content)?;
        config.warn_unknown_log_level();
        Ok(config)
    }

    /// Compact JSON, as handed to front ends.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pretty-printed JSON, as written to disk.
    pub fn to_pretty_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The first proxy rule, created if the list is empty.
    ///
    /// Single-rule editors (the CLI) operate on this rule.
    pub fn primary_rule_mut(&mut self) -> &mut ProxyRule {
        if self.proxies.is_empty() {
            self.proxies.push(ProxyRule::default());
        }
        &mut self.proxies[0]
    }

    /// Whether the log level is one ProxiFyre knows about.
    #[must_use]
    pub fn has_known_log_level(&self) -> bool {
        KNOWN_LOG_LEVELS.contains(&self.log_level.as_str())
    }

    fn warn_unknown_log_level(&self) {
        if !self.has_known_log_level() {
            warn!(
                log_level = %self.log_level,
                known = ?KNOWN_LOG_LEVELS,
                "Unrecognised log level, keeping it as-is"
            );
        }
    }
}

/// Reads and writes `app-config.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted at the resolver's authoritative configuration path.
    #[must_use]
    pub fn from_resolver(paths: &PathResolver) -> Self {
        Self::new(paths.config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration.
    ///
    /// A missing file yields [`ManagerConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<ManagerConfig, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No config file, using defaults");
            return Ok(ManagerConfig::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        ManagerConfig::from_json(&content)
    }

    /// Load the configuration, falling back to the defaults on any error.
    #[must_use]
    pub fn load_or_default(&self) -> ManagerConfig {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable config, using defaults");
            ManagerConfig::default()
        })
    }

    /// Replace the file with `config`, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, config: &ManagerConfig) -> Result<(), ConfigError> {
        let content = config.to_pretty_json()?;
        std::fs::write(&self.path, content).map_err(|e| ConfigError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;
        debug!(path = %self.path.display(), "Saved config");
        Ok(())
    }

    /// Parse raw JSON, save it and return the parsed configuration.
    ///
    /// Nothing is written if the JSON does not parse.
    pub fn save_json(&self, content: &str) -> Result<ManagerConfig, ConfigError> {
        let config = ManagerConfig::from_json(content)?;
        self.save(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, ConfigStore) {
        let temp = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create temp dir: {e}"),
        };
        let store = ConfigStore::new(temp.path().join("app-config.json"));
        (temp, store)
    }

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.log_level, "Error");
        assert_eq!(config.proxies.len(), 1);
        assert!(config.proxies[0].app_names.is_empty());
        assert_eq!(config.proxies[0].supported_protocols, vec!["TCP", "UDP"]);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp, store) = temp_store();
        assert_eq!(store.load()?, ManagerConfig::default());
        Ok(())
    }

    #[test]
    fn test_save_and_load_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp, store) = temp_store();
        let config = ManagerConfig {
            log_level: "Debug".to_string(),
            proxies: vec![
                ProxyRule {
                    app_names: vec!["chrome".to_string(), "firefox".to_string()],
                    socks5_endpoint: "127.0.0.1:1080".to_string(),
                    username: "user".to_string(),
                    password: "secret".to_string(),
                    supported_protocols: vec!["TCP".to_string()],
                },
                ProxyRule {
                    app_names: vec![],
                    socks5_endpoint: String::new(),
                    username: String::new(),
                    password: String::new(),
                    supported_protocols: vec![],
                },
            ],
        };

        store.save(&config)?;
        assert_eq!(store.load()?, config);
        Ok(())
    }

    #[test]
    fn test_saved_file_uses_wire_field_names() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp, store) = temp_store();
        store.save(&ManagerConfig::default())?;

        let content = std::fs::read_to_string(store.path())?;
        assert!(content.contains("\"logLevel\""));
        assert!(content.contains("\"appNames\""));
        assert!(content.contains("\"socks5ProxyEndpoint\""));
        assert!(content.contains("\"supportedProtocols\""));
        // Pretty-printed with two-space indentation.
        assert!(content.contains("\n  \"proxies\""));
        Ok(())
    }

    #[test]
    fn test_save_replaces_rather_than_merges() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp, store) = temp_store();
        let mut config = ManagerConfig::default();
        config.proxies.push(ProxyRule::default());
        store.save(&config)?;

        let replacement = ManagerConfig {
            log_level: "Info".to_string(),
            proxies: vec![],
        };
        store.save(&replacement)?;
        assert_eq!(store.load()?, replacement);
        Ok(())
    }

    #[test]
    fn test_load_malformed_file_errors() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp, store) = temp_store();
        std::fs::write(store.path(), "{ not json")?;

        assert!(matches!(store.load(), Err(ConfigError::ParseError(_))));
        assert_eq!(store.load_or_default(), ManagerConfig::default());
        Ok(())
    }

    #[test]
    fn test_missing_fields_take_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = ManagerConfig::from_json(r#"{"proxies":[{"appNames":["curl"]}]}"#)?;
        assert_eq!(config.log_level, "Error");
        assert_eq!(config.proxies[0].app_names, vec!["curl"]);
        assert_eq!(config.proxies[0].supported_protocols, vec!["TCP", "UDP"]);

        let config = ManagerConfig::from_json("{}")?;
        assert_eq!(config, ManagerConfig::default());
        Ok(())
    }

    #[test]
    fn test_null_sequences_take_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp, store) = temp_store();
        std::fs::write(
            store.path(),
            r#"{
  "logLevel": "Error",
  "proxies": [
    {
      "appNames": null,
      "socks5ProxyEndpoint": "127.0.0.1:1080",
      "username": "alice",
      "password": "s3cret",
      "supportedProtocols": null
    }
  ]
}"#,
        )?;

        let config = store.load()?;
        assert!(config.proxies[0].app_names.is_empty());
        assert_eq!(config.proxies[0].supported_protocols, vec!["TCP", "UDP"]);
        assert_eq!(config.proxies[0].socks5_endpoint, "127.0.0.1:1080");
        assert_eq!(config.proxies[0].username, "alice");

        let config = ManagerConfig::from_json(r#"{"logLevel":"Info","proxies":null}"#)?;
        assert!(config.proxies.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_json_rejects_invalid_without_writing() {
        let (_temp, store) = temp_store();
        assert!(store.save_json("[1, 2").is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_json_writes_parsed_config() -> Result<(), Box<dyn std::error::Error>> {
        let (_temp, store) = temp_store();
        let saved = store.save_json(
            r#"{"logLevel":"Warning","proxies":[{"appNames":[],"socks5ProxyEndpoint":"10.0.0.1:9050","username":"","password":"","supportedProtocols":["UDP"]}]}"#,
        )?;
        assert_eq!(saved.proxies[0].socks5_endpoint, "10.0.0.1:9050");
        assert_eq!(store.load()?, saved);
        Ok(())
    }

    #[test]
    fn test_to_json_is_compact() -> Result<(), Box<dyn std::error::Error>> {
        let json = ManagerConfig::default().to_json()?;
        assert!(!json.contains('\n'));
        assert_eq!(ManagerConfig::from_json(&json)?, ManagerConfig::default());
        Ok(())
    }

    #[test]
    fn test_unknown_log_level_is_preserved() -> Result<(), Box<dyn std::error::Error>> {
        let config = ManagerConfig::from_json(r#"{"logLevel":"Verbose","proxies":[]}"#)?;
        assert_eq!(config.log_level, "Verbose");
        assert!(!config.has_known_log_level());
        Ok(())
    }

    #[test]
    fn test_primary_rule_mut_creates_rule() {
        let mut config = ManagerConfig {
            log_level: "Error".to_string(),
            proxies: vec![],
        };
        config.primary_rule_mut().app_names.push("telegram".to_string());
        assert_eq!(config.proxies.len(), 1);
        assert_eq!(config.proxies[0].app_names, vec!["telegram"]);
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(ProxyRule::validate_endpoint("").is_ok());
        assert!(ProxyRule::validate_endpoint("127.0.0.1:1080").is_ok());
        assert!(ProxyRule::validate_endpoint("proxy.example.com:9050").is_ok());
        assert!(ProxyRule::validate_endpoint("127.0.0.1").is_err());
        assert!(ProxyRule::validate_endpoint(":1080").is_err());
        assert!(ProxyRule::validate_endpoint("host:99999").is_err());
    }
}
