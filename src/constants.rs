//! Global constants for procaudit
//!
//! Centralized location for application-wide constants

use std::time::Duration;

/// Logging subsystem identifier (macOS Unified Logging subsystem, log target prefix)
pub const APP_SUBSYSTEM: &str = "com.procaudit.agent";

/// Directory name used under the platform config dir
pub const CONFIG_DIR_NAME: &str = "procaudit";

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "procaudit.toml";

/// Sid reported on stop when no identity was cached for the process
pub const SID_UNKNOWN: &str = "UNKNOWN";
/// Owner lookup found no process with the requested pid
pub const SID_PROCESS_NOT_FOUND: &str = "UNKNOWN_PROCESS_NOT_FOUND";
/// Owner lookup found the process but it carried no owner
pub const SID_NOT_FOUND: &str = "UNKNOWN_SID_NOT_FOUND";
/// Owner lookup failed
pub const SID_ERROR: &str = "ERROR_GETTING_SID";

/// Placeholder for a name or field that is not available
pub const NOT_AVAILABLE: &str = "N/A";
/// Parent name lookup failed
pub const PROCESS_NAME_ERROR: &str = "ERROR_GETTING_PROCESS_NAME";

/// Default cache expiry for unmatched start entries
pub const DEFAULT_CACHE_EXPIRY_MINUTES: u64 = 30;
/// Default interval between cache cleanup sweeps
pub const DEFAULT_CLEANUP_INTERVAL_MINUTES: u64 = 10;
/// Default interval between status reports
pub const DEFAULT_STATUS_INTERVAL_MINUTES: u64 = 5;
/// Upper bound for the expiry and timer settings (one week)
pub const MAX_MINUTES_SETTING: u64 = 7 * 24 * 60;

/// Polling interval bounds for the process table source, in seconds
pub const POLLING_INTERVAL_MIN: f64 = 0.1;
pub const POLLING_INTERVAL_MAX: f64 = 300.0;
pub const DEFAULT_POLLING_INTERVAL: f64 = 1.0;

/// Raw event queue between the event source and the intake loop
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;
/// Upper bound on concurrently processed events
pub const DEFAULT_MAX_IN_FLIGHT_EVENTS: usize = 256;

/// How often the config file is checked for changes
pub const RELOAD_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// How long shutdown waits for in-flight event tasks
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);
