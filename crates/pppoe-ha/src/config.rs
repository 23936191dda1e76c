//! Configuration loading and validation for pppoe-ha

use carp::DEFAULT_IFCONFIG;
use failover::stabilizer::{DEFAULT_POLL_INTERVAL, DEFAULT_WINDOW};
use failover::suppression::DEFAULT_SUPPRESSION_DIR;
use failover::{ConfigSource, MappingRow, StabilizerSettings, VirtualIp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use validator::{Validate, ValidationError};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "PPPOE_HA_CONFIG";

/// Default location of the pfSense control utility
pub const DEFAULT_PFSCTL: &str = "/usr/local/sbin/pfSctl";

/// Default log file
pub const DEFAULT_LOG_FILE: &str = "/var/log/pppoe-ha.log";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub suppression: SuppressionSettings,

    #[serde(default)]
    pub stabilizer: StabilizerSection,

    #[serde(default)]
    pub commands: CommandSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Friendly interface name to real interface name
    #[serde(default)]
    pub interfaces: HashMap<String, String>,

    /// Virtual IP table keyed by reference
    #[serde(default)]
    pub virtual_ips: HashMap<String, VirtualIp>,

    /// Mapping rows, in the order they are processed
    #[serde(default)]
    pub mappings: Vec<MappingRow>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.suppression.validate()?;
        self.stabilizer.validate()?;
        self.commands.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Where and for how long role events are suppressed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuppressionSettings {
    #[validate(custom = "validate_absolute_path")]
    pub dir: PathBuf,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_window")]
    pub window: Duration,
}

/// Stabilization loop timing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StabilizerSection {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_poll_interval")]
    pub poll_interval: Duration,
}

/// External commands
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CommandSettings {
    #[validate(custom = "validate_absolute_path")]
    pub ifconfig: PathBuf,

    #[validate(custom = "validate_absolute_path")]
    pub pfsctl: PathBuf,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingSettings {
    pub level: Option<String>,

    #[validate(custom = "validate_log_format")]
    pub format: Option<String>,

    /// Log file shared with detached stabilizers; `null` logs to stderr
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl LoggingSettings {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

// Default implementations

impl Default for SuppressionSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_SUPPRESSION_DIR),
            window: DEFAULT_WINDOW,
        }
    }
}

impl Default for StabilizerSection {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: None,
            format: None,
            file: default_log_file(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_LOG_FILE))
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            ifconfig: PathBuf::from(DEFAULT_IFCONFIG),
            pfsctl: PathBuf::from(DEFAULT_PFSCTL),
        }
    }
}

// Custom validators

fn validate_absolute_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("path_empty"));
    }
    if !path.is_absolute() {
        return Err(ValidationError::new("path_not_absolute"));
    }
    Ok(())
}

fn validate_window(window: &Duration) -> Result<(), ValidationError> {
    let secs = window.as_secs();
    if !(1..=3600).contains(&secs) {
        return Err(ValidationError::new("window_out_of_range"));
    }
    Ok(())
}

fn validate_poll_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if !(1..=600).contains(&secs) {
        return Err(ValidationError::new("poll_interval_out_of_range"));
    }
    Ok(())
}

fn validate_log_format(format: &str) -> Result<(), ValidationError> {
    match format.to_ascii_lowercase().as_str() {
        "text" | "json" => Ok(()),
        _ => Err(ValidationError::new("log_format_unknown")),
    }
}

// Configuration loading implementation

impl Config {
    /// Load configuration from the search paths.
    ///
    /// Returns the file it came from, or `None` when running on defaults.
    pub fn load() -> Result<(Self, Option<PathBuf>), ConfigError> {
        match Self::find_config_file()? {
            Some(path) => {
                let config = Self::load_from_file(&path)?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file.
    ///
    /// An explicit `PPPOE_HA_CONFIG` must exist; the standard locations are
    /// optional.
    pub fn find_config_file() -> Result<Option<PathBuf>, ConfigError> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            if path.is_file() {
                return Ok(Some(path));
            }
            return Err(ConfigError::FileNotFound(path));
        }

        Ok(Self::search_paths().into_iter().find(|p| p.is_file()))
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/usr/local/etc/pppoe-ha.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./pppoe-ha.yaml"));
        paths
    }

    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/pppoe-ha/pppoe-ha.yaml"))
    }

    pub fn stabilizer_settings(&self) -> StabilizerSettings {
        StabilizerSettings {
            window: self.suppression.window,
            poll_interval: self.stabilizer.poll_interval,
        }
    }
}

impl ConfigSource for Config {
    fn mapping_rows(&self) -> common::Result<Vec<MappingRow>> {
        Ok(self.mappings.clone())
    }

    fn virtual_ips(&self) -> common::Result<HashMap<String, VirtualIp>> {
        Ok(self.virtual_ips.clone())
    }

    fn resolve_real_interface(&self, friendly: &str) -> Option<String> {
        self.interfaces.get(friendly).cloned()
    }
}

/// Mapping source backed by a configuration file that is re-read on every
/// call, so edits apply to the next event without a restart.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> common::Result<Config> {
        Config::load_from_file(&self.path)
            .map_err(|e| common::Error::config(format!("{}: {e}", self.path.display())))
    }
}

impl ConfigSource for FileConfigSource {
    fn mapping_rows(&self) -> common::Result<Vec<MappingRow>> {
        Ok(self.load()?.mappings)
    }

    fn virtual_ips(&self) -> common::Result<HashMap<String, VirtualIp>> {
        Ok(self.load()?.virtual_ips)
    }

    fn resolve_real_interface(&self, friendly: &str) -> Option<String> {
        match self.load() {
            Ok(config) => config.interfaces.get(friendly).cloned(),
            Err(e) => {
                warn!(iface = friendly, error = %e, "Failed to resolve interface");
                None
            }
        }
    }
}
