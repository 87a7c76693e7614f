use crate::models::{ObservedProcess, ProcessSnapshot, RawEventKind, RawProcessEvent};

/// Processes that appeared and disappeared between two polling cycles
#[derive(Debug, Default)]
pub struct ProcessChanges {
    pub started: Vec<ObservedProcess>,
    pub exited: Vec<ObservedProcess>,
}

impl ProcessChanges {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.exited.is_empty()
    }

    /// Raw events for these changes; exits come first so a reused PID stops before it starts again
    pub fn into_events(self) -> impl Iterator<Item = RawProcessEvent> {
        let exited = self
            .exited
            .into_iter()
            .map(|p| p.to_raw_event(RawEventKind::Delete));
        let started = self
            .started
            .into_iter()
            .map(|p| p.to_raw_event(RawEventKind::Create));
        exited.chain(started)
    }
}

/// Manages process state tracking between polling cycles
pub struct ProcessTracker {
    current_snapshot: Option<ProcessSnapshot>,
}

impl ProcessTracker {
    pub fn new() -> Self {
        Self {
            current_snapshot: None,
        }
    }

    /// Compare a new snapshot against the previous one
    pub fn detect_changes(&mut self, new_snapshot: ProcessSnapshot) -> ProcessChanges {
        let changes = match &self.current_snapshot {
            // First snapshot is the baseline; processes already running are not reported
            None => ProcessChanges::default(),
            Some(previous) => ProcessChanges {
                started: new_snapshot.new_processes(previous),
                exited: new_snapshot.exited_processes(previous),
            },
        };

        self.current_snapshot = Some(new_snapshot);
        changes
    }

    #[cfg(test)]
    fn has_baseline(&self) -> bool {
        self.current_snapshot.is_some()
    }
}

impl Default for ProcessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(pid: u32, start_time: u64, name: &str) -> ObservedProcess {
        ObservedProcess {
            pid,
            start_time,
            name: name.to_string(),
            parent_pid: 1,
            executable_path: Some(format!("/usr/bin/{}", name)),
            command_line: Some(name.to_string()),
        }
    }

    fn snapshot(processes: Vec<ObservedProcess>) -> ProcessSnapshot {
        ProcessSnapshot::from_processes(processes)
    }

    #[test]
    fn test_new_tracker_has_no_snapshot() {
        let tracker = ProcessTracker::new();
        assert!(!tracker.has_baseline());
    }

    #[test]
    fn test_first_snapshot_returns_no_changes() {
        let mut tracker = ProcessTracker::new();
        let changes = tracker.detect_changes(snapshot(vec![
            process(100, 1000, "sshd"),
            process(101, 1001, "cron"),
        ]));

        assert!(changes.is_empty(), "First snapshot should not report any changes");
        assert!(tracker.has_baseline());
    }

    #[test]
    fn test_new_process_detected_in_second_snapshot() {
        let mut tracker = ProcessTracker::new();
        tracker.detect_changes(snapshot(vec![process(100, 1000, "sshd")]));

        let changes = tracker.detect_changes(snapshot(vec![
            process(100, 1000, "sshd"),
            process(102, 1002, "vim"),
        ]));

        assert_eq!(changes.started.len(), 1);
        assert_eq!(changes.started[0].pid, 102);
        assert_eq!(changes.started[0].name, "vim");
        assert!(changes.exited.is_empty());
    }

    #[test]
    fn test_terminated_process_reported_as_exited() {
        let mut tracker = ProcessTracker::new();
        tracker.detect_changes(snapshot(vec![
            process(100, 1000, "sshd"),
            process(101, 1001, "cron"),
        ]));

        let changes = tracker.detect_changes(snapshot(vec![process(101, 1001, "cron")]));

        assert!(changes.started.is_empty());
        assert_eq!(changes.exited.len(), 1);
        assert_eq!(changes.exited[0].pid, 100);
    }

    #[test]
    fn test_pid_reuse_reported_as_exit_then_start() {
        let mut tracker = ProcessTracker::new();
        tracker.detect_changes(snapshot(vec![process(100, 1000, "sshd")]));

        // Same PID, different start time: a different process
        let changes = tracker.detect_changes(snapshot(vec![process(100, 2000, "vim")]));

        let events: Vec<RawProcessEvent> = changes.into_events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, RawEventKind::Delete);
        assert_eq!(events[0].name, "sshd");
        assert_eq!(events[1].kind, RawEventKind::Create);
        assert_eq!(events[1].name, "vim");
    }

    #[test]
    fn test_unchanged_snapshot_has_no_changes() {
        let mut tracker = ProcessTracker::new();
        let processes = vec![process(100, 1000, "sshd"), process(101, 1001, "cron")];
        tracker.detect_changes(snapshot(processes.clone()));

        assert!(tracker.detect_changes(snapshot(processes)).is_empty());
    }

    #[test]
    fn test_raw_event_carries_process_details() {
        let mut tracker = ProcessTracker::new();
        tracker.detect_changes(snapshot(vec![]));

        let changes = tracker.detect_changes(snapshot(vec![process(7, 70, "top")]));
        let event = changes.into_events().next().unwrap();

        assert_eq!(event.process_id, 7);
        assert_eq!(event.parent_process_id, 1);
        assert_eq!(event.executable_path.as_deref(), Some("/usr/bin/top"));
        assert_eq!(event.command_line.as_deref(), Some("top"));
    }
}
