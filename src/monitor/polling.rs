//! Polling event source backed by the local process table
//!
//! Each cycle refreshes the process list, diffs it against the previous
//! snapshot and delivers Create/Delete events for processes matching the
//! subscription query.

use crate::constants::{POLLING_INTERVAL_MAX, POLLING_INTERVAL_MIN};
use crate::models::{MonitorError, ObservedProcess, ProcessSnapshot};
use crate::monitor::process_tracker::ProcessTracker;
use crate::monitor::query::ProcessQuery;
use crate::monitor::source::{EventSender, EventSubscription, ProcessEventSource};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Event source that detects process starts and exits by polling
#[derive(Debug, Clone)]
pub struct PollingEventSource {
    interval: Duration,
}

impl PollingEventSource {
    pub fn new(interval: Duration) -> Result<Self, MonitorError> {
        let secs = interval.as_secs_f64();
        if !(POLLING_INTERVAL_MIN..=POLLING_INTERVAL_MAX).contains(&secs) {
            return Err(MonitorError::InvalidInterval(secs));
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl ProcessEventSource for PollingEventSource {
    fn name(&self) -> &str {
        "process table polling"
    }

    fn subscribe(
        &self,
        query: &ProcessQuery,
        events: EventSender,
    ) -> Result<Box<dyn EventSubscription>, MonitorError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MonitorError::Subscription(format!("no async runtime available: {}", e)))?;

        log::debug!(
            "Starting process table polling every {:.1}s for {}",
            self.interval.as_secs_f64(),
            query
        );

        let task = runtime.spawn(poll_process_table(self.interval, query.clone(), events));
        Ok(Box::new(PollingSubscription { task }))
    }
}

struct PollingSubscription {
    task: JoinHandle<()>,
}

impl EventSubscription for PollingSubscription {
    fn stop(self: Box<Self>) {
        self.task.abort();
    }
}

async fn poll_process_table(interval: Duration, query: ProcessQuery, events: EventSender) {
    let mut tracker = ProcessTracker::new();
    let mut system = System::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // Refreshing the process table is blocking work
        let refreshed = tokio::task::spawn_blocking(move || {
            refresh_processes(&mut system);
            let snapshot = create_process_snapshot(&system);
            (system, snapshot)
        })
        .await;

        let snapshot = match refreshed {
            Ok((returned, snapshot)) => {
                system = returned;
                snapshot
            }
            Err(e) => {
                log::error!("Process table refresh failed: {}", e);
                return;
            }
        };

        let changes = tracker.detect_changes(snapshot);
        for event in changes.into_events().filter(|e| query.matches(&e.name)) {
            if events.send(event).await.is_err() {
                log::debug!("Event receiver closed, stopping process table polling");
                return;
            }
        }
    }
}

fn refresh_processes(system: &mut System) {
    let refresh = ProcessRefreshKind::new()
        .with_exe(UpdateKind::OnlyIfNotSet)
        .with_cmd(UpdateKind::OnlyIfNotSet);
    system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);
}

fn create_process_snapshot(system: &System) -> ProcessSnapshot {
    ProcessSnapshot::from_processes(system.processes().iter().map(|(pid, process)| {
        let command_line = if process.cmd().is_empty() {
            None
        } else {
            Some(
                process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        };

        ObservedProcess {
            pid: pid.as_u32(),
            start_time: process.start_time(),
            name: process.name().to_string_lossy().to_string(),
            parent_pid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
            executable_path: process.exe().map(|p| p.display().to_string()),
            command_line,
        }
    }))
}
