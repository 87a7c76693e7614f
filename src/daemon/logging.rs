//! Structured audit logging
//!
//! Every agent event is one log line of the form `<message> | <json>`, where
//! the JSON carries an `event` key and an RFC 3339 timestamp. On macOS the
//! lines go to the Unified Logging System; elsewhere to stderr via env_logger.

use crate::constants::APP_SUBSYSTEM;
use crate::filter::FilterSet;
use crate::models::{ProcessEventRecord, ProcessEventType};
use crate::monitor::correlator::CorrelatorCounts;
use crate::output::{self, OutputFormat, RecordSink};
use anyhow::Result;
use log::{Level, LevelFilter};
use serde_json::json;
use std::path::Path;

/// Log target for audit events
pub const AUDIT_TARGET: &str = "procaudit::audit";

/// Install the global logger
#[cfg(target_os = "macos")]
pub fn init_logging(level: LevelFilter) -> Result<()> {
    oslog::OsLogger::new(APP_SUBSYSTEM)
        .level_filter(level)
        .init()
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))
}

/// Install the global logger; `RUST_LOG` overrides the configured level
#[cfg(not(target_os = "macos"))]
pub fn init_logging(level: LevelFilter) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logger for {}: {}", APP_SUBSYSTEM, e))
}

/// Periodic status snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub cache_entries: usize,
    pub include_filters: usize,
    pub exclude_filters: usize,
    pub subscription_active: bool,
    pub in_flight: usize,
    pub counts: CorrelatorCounts,
}

/// Agent event logger
#[derive(Debug, Clone, Default)]
pub struct AuditLogger {
    stdout: OutputFormat,
}

impl AuditLogger {
    pub fn new(stdout: OutputFormat) -> Self {
        Self { stdout }
    }

    /// Log agent startup event
    pub fn log_startup(&self, config_path: Option<&Path>, pid: u32, filters: &FilterSet) {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let base_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.display().to_string()));

        let data = json!({
            "event": "agent_startup",
            "pid": pid,
            "user": user,
            "base_directory": base_dir,
            "config_path": config_path.map(|p| p.display().to_string()),
            "include_filters": filters.include_count(),
            "exclude_filters": filters.exclude_count(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            Level::Info,
            &format!(
                "Process monitor started as {} with {} include and {} exclude filters",
                user,
                filters.include_count(),
                filters.exclude_count()
            ),
            &data,
        );
    }

    /// Log agent shutdown event
    pub fn log_shutdown(&self, reason: &str, cache_entries: usize) {
        let data = json!({
            "event": "agent_shutdown",
            "reason": reason,
            "cache_entries": cache_entries,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            Level::Info,
            &format!("Process monitor stopped ({}), {} cache entries remaining", reason, cache_entries),
            &data,
        );
    }

    /// Log an emitted process record
    pub fn log_process_event(&self, record: &ProcessEventRecord) {
        let data = json!({
            "event": match record.event_type {
                ProcessEventType::Start => "process_start",
                ProcessEventType::Stop => "process_stop",
            },
            "pid": record.process_id,
            "process_name": record.name,
            "owner_sid": record.owner_sid,
            "parent_pid": record.parent_process_id,
            "parent_name": record.parent_name,
            "executable_path": record.executable_path,
            "command_line": record.command_line,
            "timestamp": record.timestamp.to_rfc3339(),
        });

        self.log_structured(Level::Info, &output::format_record_human(record), &data);
    }

    /// Log a filter change
    pub fn log_filters_updated(&self, filters: &FilterSet, outcome: &str) {
        let include: Vec<&str> = filters.include().iter().map(|f| f.as_str()).collect();
        let exclude: Vec<&str> = filters.exclude().iter().map(|f| f.as_str()).collect();
        let data = json!({
            "event": "filters_updated",
            "include_filters": include,
            "exclude_filters": exclude,
            "outcome": outcome,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            Level::Info,
            &format!(
                "Process filters updated: {} include filters, {} exclude filters",
                include.len(),
                exclude.len()
            ),
            &data,
        );
    }

    /// Log a failed (re)subscription
    pub fn log_subscription_error(&self, error: &str) {
        let data = json!({
            "event": "subscription_error",
            "message": error,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(Level::Error, "Error updating process monitoring subscription", &data);
    }

    /// Log the result of a cache cleanup sweep
    pub fn log_cache_cleanup(&self, removed: usize, remaining: usize) {
        let data = json!({
            "event": "cache_cleanup",
            "removed": removed,
            "remaining": remaining,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            Level::Debug,
            &format!("Cleaned up {} expired cache entries, {} remaining", removed, remaining),
            &data,
        );
    }

    /// Log the periodic status report
    pub fn log_status(&self, status: &StatusReport) {
        let data = json!({
            "event": "status",
            "cache_entries": status.cache_entries,
            "include_filters": status.include_filters,
            "exclude_filters": status.exclude_filters,
            "subscription_active": status.subscription_active,
            "in_flight": status.in_flight,
            "events_received": status.counts.events_received,
            "events_filtered": status.counts.events_filtered,
            "events_dropped": status.counts.events_dropped,
            "records_emitted": status.counts.records_emitted,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            Level::Info,
            &format!(
                "Status: {} cache entries, {} include filters, {} exclude filters",
                status.cache_entries, status.include_filters, status.exclude_filters
            ),
            &data,
        );
    }

    /// Log error events
    pub fn log_error(&self, error_message: &str, context: Option<&str>) {
        let data = json!({
            "event": "error",
            "message": error_message,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(Level::Error, error_message, &data);
    }

    fn log_structured(&self, level: Level, message: &str, data: &serde_json::Value) {
        log::log!(target: AUDIT_TARGET, level, "{}", structured_line(message, data));
    }
}

impl RecordSink for AuditLogger {
    fn emit(&self, record: &ProcessEventRecord) {
        self.log_process_event(record);
        if let Err(e) = output::print_record(record, self.stdout) {
            log::warn!("Failed to write record to stdout: {}", e);
        }
    }
}

/// Format the complete log message with structured data
pub fn structured_line(message: &str, data: &serde_json::Value) -> String {
    format!("{} | {}", message, data)
}
