//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$HAYSTACK_CONFIG` (environment variable)
//! 2. `~/.config/haystack/config.toml` (Linux)
//!    `~/Library/Application Support/haystack/config.toml` (macOS)
//! 3. Built-in defaults
//!
//! The archive home directory holds `data/data.sqlite` and the static
//! `files/` served next to the pages.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HAYSTACK_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub server: ServerConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory for the log file.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub listen: String,
    /// Archive home directory. Defaults to the platform data directory.
    pub home_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Explicit database file, instead of `<home>/data/data.sqlite`.
    pub database: Option<PathBuf>,
    /// Senders listed on the index page need more messages than this.
    pub sender_threshold: u32,
    /// Maximum rows a listing or search returns.
    pub result_limit: u32,
    /// Search shortcuts shown on the index page.
    pub topics: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            home_dir: None,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            database: None,
            sender_threshold: 100,
            result_limit: 1000,
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

const DEFAULT_TOPICS: &[&str] = &[
    "acknowledgement",
    "access control",
    "amqp 1.0",
    "amqp",
    "authentication",
    "binding",
    "broker",
    "c++ client",
    "certificate",
    "client",
    "cluster",
    "configuration",
    "connection",
    "consumer",
    "credit",
    "deadlock",
    "delivery",
    "dispatch",
    "documentation",
    "durable subscription",
    "example",
    "exchange",
    "failover",
    "federation",
    "flow control",
    "heartbeats",
    "java client",
    "jms",
    "kerberos",
    "large message",
    "ldap",
    "leak",
    "link",
    "logging",
    "management",
    "memory",
    "message groups",
    "performance",
    "persistence",
    "policy",
    "priority queue",
    "producer",
    "protocol",
    "proton",
    "python",
    "queue",
    "receiver",
    "reconnect",
    "release",
    "router",
    "sasl",
    "selectors",
    "sender",
    "session",
    "settlement",
    "ssl",
    "store",
    "subscription",
    "test failure",
    "timeout",
    "transaction",
    "transport",
    "websockets",
    "windows",
];

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    let Some(path) = config_file_path() else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }

    match load_config_from(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    }
}

/// Read and parse one config file.
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Write configuration to `path`, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(config)?)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("haystack").join("config.toml"))
}

/// Archive home: configured, or `<data_dir>/haystack`.
pub fn home_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.server.home_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haystack")
}

/// Database file: configured, or `<home>/data/data.sqlite`.
pub fn database_path(config: &Config) -> PathBuf {
    match config.archive.database {
        Some(ref path) => path.clone(),
        None => home_dir(config).join("data").join("data.sqlite"),
    }
}

/// Static files served by the viewer: `<home>/files`.
pub fn files_dir(config: &Config) -> PathBuf {
    home_dir(config).join("files")
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haystack")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("haystack.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.archive.sender_threshold, 100);
        assert_eq!(cfg.archive.result_limit, 1000);
        assert!(cfg.archive.topics.contains(&"amqp 1.0".to_string()));
        assert_eq!(cfg.server.listen, "127.0.0.1:8080");
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.archive.topics = vec!["broker".into()];
        save_config(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[server]
home_dir = "/srv/haystack"

[archive]
sender_threshold = 5
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.archive.sender_threshold, 5);
        assert_eq!(cfg.archive.result_limit, 1000);
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(
            database_path(&cfg),
            PathBuf::from("/srv/haystack/data/data.sqlite")
        );
        assert_eq!(files_dir(&cfg), PathBuf::from("/srv/haystack/files"));
    }

    #[test]
    fn test_explicit_database_wins() {
        let mut cfg = Config::default();
        cfg.archive.database = Some(PathBuf::from("/tmp/other.sqlite"));
        assert_eq!(database_path(&cfg), PathBuf::from("/tmp/other.sqlite"));
    }

    #[test]
    fn test_bad_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[archive]\nsender_threshold = \"many\"\n").unwrap();
        assert!(load_config_from(&path).is_err());
    }
}
