use serde::Deserialize;
use std::path::PathBuf;

use crate::resolver::labels::EXCLUDING_LABELS;

// =============================================================================
// Logging constants
// =============================================================================

/// Environment variable overriding the configured log filter
pub const LOG_ENV_VAR: &str = "TKR_RESOLVER_LOG";

/// Log level used when neither the environment nor the config sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Error type for configuration and logging setup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid log file path: {0:?}")]
    InvalidLogPath(PathBuf),

    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open log file: {0}")]
    LogFile(#[from] tracing_appender::rolling::InitError),

    #[error("Failed to install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Labels whose presence excludes a release or OS image from every query
    pub excluded_labels: Vec<String>,
    /// Restrict all ports of a query to the releases they have in common
    pub intersect_ports: bool,
    pub log: LogConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            excluded_labels: EXCLUDING_LABELS.iter().map(|l| l.to_string()).collect(),
            intersect_ports: true,
            log: LogConfig::default(),
        }
    }
}

impl ResolverConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `tkr_resolver=debug`
    pub level: String,
    /// Log file, relative paths are placed under [`data_dir`].
    /// Logs go to stderr when unset.
    pub file: Option<PathBuf>,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
            json: false,
        }
    }
}

impl LogConfig {
    /// Where log lines are written, `None` for stderr
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|file| data_dir().join(file))
    }
}

/// Returns the path to the data directory for tkr-resolver.
/// Uses $XDG_DATA_HOME/tkr-resolver if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/tkr-resolver,
/// or ./tkr-resolver if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("tkr-resolver")
}
