//! Data models module
//!
//! Defines core data structures:
//! - RawProcessEvent: a creation/termination notification from an event source
//! - ProcessEventRecord: the normalized audit record handed to the logging sink
//! - ObservedProcess / ProcessSnapshot: process table state used by the polling source
//! - MonitorError: error taxonomy for the monitoring core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

/// Kind of raw notification delivered by an event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEventKind {
    /// A process was created
    Create,
    /// A process terminated
    Delete,
}

/// Raw process notification as produced by a process event source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProcessEvent {
    pub kind: RawEventKind,
    pub process_id: u32,
    /// Image name of the process (e.g. `calc.exe`, `bash`)
    pub name: String,
    /// Parent process id, 0 when the process has no parent
    pub parent_process_id: u32,
    pub executable_path: Option<String>,
    pub command_line: Option<String>,
}

impl RawProcessEvent {
    /// Convenience constructor for events that only carry the essentials
    pub fn new(kind: RawEventKind, process_id: u32, name: impl Into<String>) -> Self {
        Self {
            kind,
            process_id,
            name: name.into(),
            parent_process_id: 0,
            executable_path: None,
            command_line: None,
        }
    }

    pub fn with_parent(mut self, parent_process_id: u32) -> Self {
        self.parent_process_id = parent_process_id;
        self
    }

    pub fn with_executable_path(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = Some(command_line.into());
        self
    }
}

/// Type of an emitted audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessEventType {
    Start,
    Stop,
}

impl From<RawEventKind> for ProcessEventType {
    fn from(kind: RawEventKind) -> Self {
        match kind {
            RawEventKind::Create => ProcessEventType::Start,
            RawEventKind::Delete => ProcessEventType::Stop,
        }
    }
}

impl fmt::Display for ProcessEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessEventType::Start => write!(f, "Start"),
            ProcessEventType::Stop => write!(f, "Stop"),
        }
    }
}

/// Canonical audit record for a process lifecycle event.
/// Immutable once emitted; the core does not retain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEventRecord {
    pub event_type: ProcessEventType,
    pub process_id: u32,
    pub name: String,
    /// Owner identity, or one of the sentinel values when it could not be resolved
    pub owner_sid: String,
    pub parent_process_id: u32,
    pub parent_name: String,
    pub executable_path: String,
    pub command_line: String,
    pub timestamp: DateTime<Utc>,
}

/// A process seen in one polling snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedProcess {
    pub pid: u32,
    /// Process start time as Unix timestamp (seconds since epoch).
    /// Combined with PID, this uniquely identifies a process even across PID reuse.
    pub start_time: u64,
    pub name: String,
    pub parent_pid: u32,
    pub executable_path: Option<String>,
    pub command_line: Option<String>,
}

impl ObservedProcess {
    pub fn to_raw_event(&self, kind: RawEventKind) -> RawProcessEvent {
        RawProcessEvent {
            kind,
            process_id: self.pid,
            name: self.name.clone(),
            parent_process_id: self.parent_pid,
            executable_path: self.executable_path.clone(),
            command_line: self.command_line.clone(),
        }
    }
}

/// Snapshot of process state at a given moment
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    /// (PID, start_time) -> process, so PID reuse shows up as a new process
    pub processes: HashMap<(u32, u64), ObservedProcess>,
    pub timestamp: Option<SystemTime>,
}

impl ProcessSnapshot {
    pub fn from_processes(processes: impl IntoIterator<Item = ObservedProcess>) -> Self {
        Self {
            processes: processes
                .into_iter()
                .map(|p| ((p.pid, p.start_time), p))
                .collect(),
            timestamp: Some(SystemTime::now()),
        }
    }

    /// Processes in this snapshot but not in the previous one
    pub fn new_processes(&self, previous: &ProcessSnapshot) -> Vec<ObservedProcess> {
        self.processes
            .iter()
            .filter(|(key, _)| !previous.processes.contains_key(key))
            .map(|(_, process)| process.clone())
            .collect()
    }

    /// Processes in the previous snapshot that are gone from this one
    pub fn exited_processes(&self, previous: &ProcessSnapshot) -> Vec<ObservedProcess> {
        previous.new_processes(self)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// Custom error types for monitoring operations
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Note: bounds must match POLLING_INTERVAL_MIN/MAX in constants.rs
    #[error("Invalid polling interval: {0}. Must be between 0.1 and 300.0 seconds")]
    InvalidInterval(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Event subscription failed: {0}")]
    Subscription(String),

    #[error("Malformed event for PID {pid}: {reason}")]
    MalformedEvent { pid: u32, reason: String },

    #[error("Identity resolution task failed for PID {pid}: {reason}")]
    Resolution { pid: u32, reason: String },
}
