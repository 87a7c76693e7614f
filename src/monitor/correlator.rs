//! Event correlation
//!
//! Turns raw process notifications into audit records: applies the live
//! filter set, resolves the owner identity on start, recovers it from the
//! identity cache on stop, and hands each record to the sink. Every event
//! is handled in its own task; a failure in one never affects another.

use crate::constants::{NOT_AVAILABLE, PROCESS_NAME_ERROR, SID_ERROR, SID_UNKNOWN};
use crate::filter::SharedFilters;
use crate::models::{MonitorError, ProcessEventRecord, ProcessEventType, RawEventKind, RawProcessEvent};
use crate::monitor::identity_cache::IdentityCache;
use crate::monitor::resolver::{self, IdentityResolver};
use crate::output::RecordSink;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Counters reported in the periodic status line
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    pub events_received: AtomicU64,
    pub events_filtered: AtomicU64,
    pub events_dropped: AtomicU64,
    pub records_emitted: AtomicU64,
}

/// Point-in-time copy of `CorrelatorStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorCounts {
    pub events_received: u64,
    pub events_filtered: u64,
    pub events_dropped: u64,
    pub records_emitted: u64,
}

impl CorrelatorStats {
    pub fn counts(&self) -> CorrelatorCounts {
        CorrelatorCounts {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
        }
    }
}

pub struct EventCorrelator {
    filters: Arc<SharedFilters>,
    cache: Arc<IdentityCache>,
    resolver: Arc<dyn IdentityResolver>,
    sink: Arc<dyn RecordSink>,
    in_flight: Arc<Semaphore>,
    max_in_flight: u32,
    shutting_down: AtomicBool,
    stats: CorrelatorStats,
}

impl EventCorrelator {
    pub fn new(
        filters: Arc<SharedFilters>,
        cache: Arc<IdentityCache>,
        resolver: Arc<dyn IdentityResolver>,
        sink: Arc<dyn RecordSink>,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = max_in_flight.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize)) as u32;
        Self {
            filters,
            cache,
            resolver,
            sink,
            in_flight: Arc::new(Semaphore::new(max_in_flight as usize)),
            max_in_flight,
            shutting_down: AtomicBool::new(false),
            stats: CorrelatorStats::default(),
        }
    }

    pub fn stats(&self) -> CorrelatorCounts {
        self.stats.counts()
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Hand an event to its own task, waiting while the in-flight limit is reached.
    ///
    /// Returns `false` once shutdown has begun; the event is discarded.
    pub async fn dispatch(self: &Arc<Self>, event: RawProcessEvent) -> bool {
        if self.is_shutting_down() {
            log::debug!("Discarding event for PID {} during shutdown", event.process_id);
            return false;
        }

        let permit = match Arc::clone(&self.in_flight).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return false,
        };

        let correlator = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            if let Some(record) = correlator.handle_raw_event(event).await {
                correlator.emit(&record);
            }
        });
        true
    }

    /// Correlate one raw event into a record.
    ///
    /// `None` when the event was filtered out or could not be processed; the
    /// latter is logged.
    pub async fn handle_raw_event(&self, event: RawProcessEvent) -> Option<ProcessEventRecord> {
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);
        let pid = event.process_id;

        match self.correlate(event).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                self.stats.events_filtered.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                log::error!("Error handling process event for PID {}: {}", pid, e);
                None
            }
        }
    }

    async fn correlate(
        &self,
        event: RawProcessEvent,
    ) -> Result<Option<ProcessEventRecord>, MonitorError> {
        let name = event.name.trim().to_string();
        if name.is_empty() {
            return Err(MonitorError::MalformedEvent {
                pid: event.process_id,
                reason: "missing process name".to_string(),
            });
        }

        // Filtered events cost no lookups and leave the cache untouched
        if !self.filters.should_monitor(&name) {
            return Ok(None);
        }

        let (parent_name, owner_sid) = match event.kind {
            RawEventKind::Create => {
                let (parent_name, owner_sid) = tokio::join!(
                    self.resolve_parent_name(event.parent_process_id),
                    self.resolve_owner_sid(event.process_id)
                );
                // Cached even when it is a sentinel, so the stop reports the same value
                self.cache.on_process_start(event.process_id, owner_sid.clone());
                (parent_name, owner_sid)
            }
            RawEventKind::Delete => {
                let parent_name = self.resolve_parent_name(event.parent_process_id).await;
                let owner_sid = self
                    .cache
                    .on_process_stop(event.process_id)
                    .unwrap_or_else(|| SID_UNKNOWN.to_string());
                (parent_name, owner_sid)
            }
        };

        Ok(Some(ProcessEventRecord {
            event_type: ProcessEventType::from(event.kind),
            process_id: event.process_id,
            name,
            owner_sid,
            parent_process_id: event.parent_process_id,
            parent_name,
            executable_path: event.executable_path.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            command_line: event.command_line.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            timestamp: Utc::now(),
        }))
    }

    async fn resolve_owner_sid(&self, pid: u32) -> String {
        let lookup = Arc::clone(&self.resolver);
        tokio::task::spawn_blocking(move || resolver::owner_sid_or_sentinel(lookup.as_ref(), pid))
            .await
            .unwrap_or_else(|e| {
                let err = MonitorError::Resolution { pid, reason: e.to_string() };
                log::error!("{}", err);
                SID_ERROR.to_string()
            })
    }

    async fn resolve_parent_name(&self, parent_pid: u32) -> String {
        if parent_pid == 0 {
            return NOT_AVAILABLE.to_string();
        }
        let lookup = Arc::clone(&self.resolver);
        tokio::task::spawn_blocking(move || {
            resolver::process_name_or_placeholder(lookup.as_ref(), parent_pid)
        })
        .await
        .unwrap_or_else(|e| {
            log::warn!("Parent name lookup for PID {} failed: {}", parent_pid, e);
            PROCESS_NAME_ERROR.to_string()
        })
    }

    /// Hand a record to the sink unless shutdown has begun
    pub fn emit(&self, record: &ProcessEventRecord) {
        if self.is_shutting_down() {
            log::debug!(
                "Suppressing {} record for PID {} after shutdown",
                record.event_type,
                record.process_id
            );
            return;
        }
        self.sink.emit(record);
        self.stats.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Stop accepting events and emitting records
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Wait for in-flight event tasks to finish. Returns `false` on timeout.
    pub async fn drain(&self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.in_flight.acquire_many(self.max_in_flight)).await {
            Ok(Ok(_all_permits)) => true,
            Ok(Err(_)) => true,
            Err(_) => false,
        }
    }

    /// Number of event tasks currently running
    pub fn in_flight(&self) -> usize {
        self.max_in_flight as usize - self.in_flight.available_permits()
    }
}
