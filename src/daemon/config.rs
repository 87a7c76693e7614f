//! Configuration management for the agent
//!
//! Handles TOML configuration parsing, validation, and change detection for
//! live reloads. Every key is optional; missing keys take their defaults.

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CACHE_EXPIRY_MINUTES,
    DEFAULT_CLEANUP_INTERVAL_MINUTES, DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_MAX_IN_FLIGHT_EVENTS,
    DEFAULT_POLLING_INTERVAL, DEFAULT_STATUS_INTERVAL_MINUTES, MAX_MINUTES_SETTING,
    POLLING_INTERVAL_MAX, POLLING_INTERVAL_MIN,
};
use crate::filter::pattern_matcher::validate_filters;
use crate::models::MonitorError;
use crate::output::OutputFormat;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

/// Main agent configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfiguration {
    pub monitor: MonitorSettings,
    pub source: SourceSettings,
    pub logging: LoggingSettings,
}

/// Filter and timer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSettings {
    /// Process names (or `*`/`?` patterns) to monitor; empty = all
    pub include_filters: Vec<String>,
    /// Process names (or patterns) never monitored; wins over includes
    pub exclude_filters: Vec<String>,
    /// Age after which an unmatched start entry is dropped
    pub cache_expiry_minutes: u64,
    pub cleanup_interval_minutes: u64,
    pub status_interval_minutes: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            include_filters: Vec::new(),
            exclude_filters: Vec::new(),
            cache_expiry_minutes: DEFAULT_CACHE_EXPIRY_MINUTES,
            cleanup_interval_minutes: DEFAULT_CLEANUP_INTERVAL_MINUTES,
            status_interval_minutes: DEFAULT_STATUS_INTERVAL_MINUTES,
        }
    }
}

/// Event source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    /// Polling interval in seconds (0.1-300.0)
    pub polling_interval: f64,
    /// Capacity of the raw event queue
    pub event_queue_capacity: usize,
    /// Maximum number of events processed concurrently
    pub max_in_flight_events: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            max_in_flight_events: DEFAULT_MAX_IN_FLIGHT_EVENTS,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// error, warn, info, debug or trace; `RUST_LOG` overrides it
    pub level: String,
    /// Mirror records to stdout
    pub stdout: OutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            stdout: OutputFormat::None,
        }
    }
}

/// Effective monitoring parameters derived from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub include_filters: Vec<String>,
    pub exclude_filters: Vec<String>,
    pub cache_expiry: Duration,
    pub cleanup_interval: Duration,
    pub status_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        AgentConfiguration::default().monitor_config()
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

impl AgentConfiguration {
    /// Platform default location of the configuration file
    pub fn default_config_path() -> Result<PathBuf, MonitorError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                MonitorError::InvalidConfig("could not determine the configuration directory".to_string())
            })
    }

    /// Read, parse and validate a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path).map_err(|source| MonitorError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Parse and validate configuration text. `origin` is used in error messages.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, MonitorError> {
        let config: Self = toml::from_str(content).map_err(|source| MonitorError::ConfigParse {
            path: origin.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, MonitorError> {
        toml::to_string_pretty(self).map_err(|e| MonitorError::InvalidConfig(e.to_string()))
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<(), MonitorError> {
        let monitor = &self.monitor;
        validate_filters(&monitor.include_filters)?;
        validate_filters(&monitor.exclude_filters)?;

        for (key, value) in [
            ("monitor.cache_expiry_minutes", monitor.cache_expiry_minutes),
            ("monitor.cleanup_interval_minutes", monitor.cleanup_interval_minutes),
            ("monitor.status_interval_minutes", monitor.status_interval_minutes),
        ] {
            if value == 0 {
                return Err(MonitorError::InvalidConfig(format!("{} must be greater than 0", key)));
            }
            if value > MAX_MINUTES_SETTING {
                return Err(MonitorError::InvalidConfig(format!(
                    "{} must be at most {}",
                    key, MAX_MINUTES_SETTING
                )));
            }
        }

        let interval = self.source.polling_interval;
        if !(POLLING_INTERVAL_MIN..=POLLING_INTERVAL_MAX).contains(&interval) {
            return Err(MonitorError::InvalidInterval(interval));
        }
        if self.source.event_queue_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "source.event_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.source.max_in_flight_events == 0 {
            return Err(MonitorError::InvalidConfig(
                "source.max_in_flight_events must be greater than 0".to_string(),
            ));
        }

        self.log_level()?;
        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            include_filters: self.monitor.include_filters.clone(),
            exclude_filters: self.monitor.exclude_filters.clone(),
            cache_expiry: minutes(self.monitor.cache_expiry_minutes),
            cleanup_interval: minutes(self.monitor.cleanup_interval_minutes),
            status_interval: minutes(self.monitor.status_interval_minutes),
        }
    }

    /// Get polling interval as Duration
    pub fn polling_duration(&self) -> Duration {
        Duration::from_secs_f64(self.source.polling_interval)
    }

    pub fn log_level(&self) -> Result<LevelFilter, MonitorError> {
        LevelFilter::from_str(self.logging.level.trim()).map_err(|_| {
            MonitorError::InvalidConfig(format!(
                "logging.level '{}' is not one of off, error, warn, info, debug, trace",
                self.logging.level
            ))
        })
    }
}

/// Resolve which configuration to run with.
///
/// An explicit path must exist. Without one, the default path is used when
/// present and built-in defaults otherwise.
pub fn resolve_configuration(
    explicit: Option<&Path>,
) -> Result<(AgentConfiguration, Option<PathBuf>), MonitorError> {
    if let Some(path) = explicit {
        let config = AgentConfiguration::load_from_file(path)?;
        return Ok((config, Some(path.to_path_buf())));
    }

    match AgentConfiguration::default_config_path() {
        Ok(path) if path.exists() => {
            let config = AgentConfiguration::load_from_file(&path)?;
            Ok((config, Some(path)))
        }
        _ => Ok((AgentConfiguration::default(), None)),
    }
}

/// Detects edits to the configuration file between polls
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    last_content: Option<String>,
}

impl ConfigWatcher {
    /// Start watching `path`; the current content is the baseline
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified_time(&path);
        let last_content = std::fs::read_to_string(&path).ok();
        Self {
            path,
            last_modified,
            last_content,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check for a change.
    ///
    /// `None` when the file is unchanged (or only touched). Otherwise the
    /// newly parsed configuration, or the reason it was rejected.
    pub fn poll(&mut self) -> Option<Result<AgentConfiguration, MonitorError>> {
        let modified = modified_time(&self.path);
        if modified.is_some() && modified == self.last_modified {
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(source) => {
                if self.last_modified.take().is_none() {
                    // Already reported as missing
                    return None;
                }
                return Some(Err(MonitorError::ConfigIo {
                    path: self.path.display().to_string(),
                    source,
                }));
            }
        };
        self.last_modified = modified;

        if self.last_content.as_deref() == Some(content.as_str()) {
            return None;
        }
        let result = AgentConfiguration::from_toml_str(&content, &self.path);
        self.last_content = Some(content);
        Some(result)
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
