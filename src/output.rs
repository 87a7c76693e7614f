//! Output formatting module
//!
//! Handles:
//! - The `RecordSink` seam that receives every emitted audit record
//! - Human-readable and JSON rendering of process event records

use crate::models::ProcessEventRecord;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Receiver of emitted audit records.
///
/// Called concurrently from event tasks; implementations must not block for long.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &ProcessEventRecord);
}

/// How records are mirrored to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Log only
    #[default]
    None,
    Human,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::None => write!(f, "none"),
            OutputFormat::Human => write!(f, "human"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Format a record as a single human-readable line.
/// Used for both the audit log message and stdout mirroring.
pub fn format_record_human(record: &ProcessEventRecord) -> String {
    format!(
        "Process {}: {} (PID: {}) User: {} Parent: {} (PID: {}) Path: {} Command: {}",
        record.event_type,
        record.name,
        record.process_id,
        record.owner_sid,
        record.parent_name,
        record.parent_process_id,
        record.executable_path,
        record.command_line
    )
}

/// Format a record as a JSON string
pub fn format_record_json(record: &ProcessEventRecord) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

/// Print a record to stdout in the requested format
pub fn print_record(record: &ProcessEventRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::None => {}
        OutputFormat::Human => {
            println!("[{}] {}", record.timestamp.to_rfc3339(), format_record_human(record));
        }
        OutputFormat::Json => println!("{}", format_record_json(record)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcessEventType;
    use chrono::{TimeZone, Utc};

    fn record() -> ProcessEventRecord {
        ProcessEventRecord {
            event_type: ProcessEventType::Start,
            process_id: 100,
            name: "calc.exe".to_string(),
            owner_sid: "S-1-5-21-1001".to_string(),
            parent_process_id: 4,
            parent_name: "explorer.exe".to_string(),
            executable_path: "C:\\Windows\\System32\\calc.exe".to_string(),
            command_line: "calc.exe".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_format_record_human() {
        assert_eq!(
            format_record_human(&record()),
            "Process Start: calc.exe (PID: 100) User: S-1-5-21-1001 Parent: explorer.exe (PID: 4) \
             Path: C:\\Windows\\System32\\calc.exe Command: calc.exe"
        );
    }

    #[test]
    fn test_format_record_json_round_trips() {
        let json = format_record_json(&record()).unwrap();
        let parsed: ProcessEventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record());
        assert!(json.contains("\"timestamp\":\"2024-01-02T03:04:05Z\""));
    }

    #[test]
    fn test_output_format_from_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            stdout: OutputFormat,
        }
        let parsed: Wrapper = toml::from_str("stdout = \"json\"").unwrap();
        assert_eq!(parsed.stdout, OutputFormat::Json);
        assert_eq!(OutputFormat::default(), OutputFormat::None);
        assert_eq!(OutputFormat::Human.to_string(), "human");
    }
}
