//! Test doubles for the agent's host collaborators
#![allow(dead_code)]

use procaudit::models::{MonitorError, ProcessEventRecord, RawProcessEvent};
use procaudit::monitor::{
    EventSender, EventSubscription, IdentityResolver, ProcessEventSource, ProcessQuery, ResolveError,
};
use procaudit::output::RecordSink;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct SourceState {
    sender: Option<EventSender>,
    queries: Vec<String>,
}

/// Event source driven by the test: events are pushed by hand
#[derive(Default)]
pub struct ManualSource {
    state: Arc<Mutex<SourceState>>,
    subscribes: AtomicUsize,
    stops: Arc<AtomicUsize>,
    pub fail: AtomicBool,
}

impl ManualSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver an event on the active subscription
    pub async fn push(&self, event: RawProcessEvent) {
        let sender = self.state.lock().unwrap().sender.clone();
        sender
            .expect("no active subscription")
            .send(event)
            .await
            .expect("event receiver closed");
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().unwrap().sender.is_some()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }
}

struct ManualSubscription {
    state: Arc<Mutex<SourceState>>,
    stops: Arc<AtomicUsize>,
}

impl EventSubscription for ManualSubscription {
    fn stop(self: Box<Self>) {
        self.state.lock().unwrap().sender = None;
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl ProcessEventSource for ManualSource {
    fn name(&self) -> &str {
        "manual"
    }

    fn subscribe(
        &self,
        query: &ProcessQuery,
        events: EventSender,
    ) -> Result<Box<dyn EventSubscription>, MonitorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MonitorError::Subscription("access denied".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.sender = Some(events);
        state.queries.push(query.to_string());
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ManualSubscription {
            state: Arc::clone(&self.state),
            stops: Arc::clone(&self.stops),
        }))
    }
}

/// Resolver answering from fixed tables
#[derive(Default)]
pub struct TableResolver {
    pub sids: HashMap<u32, String>,
    pub names: HashMap<u32, String>,
}

impl TableResolver {
    pub fn with_sid(mut self, pid: u32, sid: &str) -> Self {
        self.sids.insert(pid, sid.to_string());
        self
    }

    pub fn with_name(mut self, pid: u32, name: &str) -> Self {
        self.names.insert(pid, name.to_string());
        self
    }
}

impl IdentityResolver for TableResolver {
    fn resolve_owner_sid(&self, pid: u32) -> Result<String, ResolveError> {
        self.sids.get(&pid).cloned().ok_or(ResolveError::ProcessNotFound)
    }

    fn resolve_process_name(&self, pid: u32) -> Result<Option<String>, ResolveError> {
        Ok(self.names.get(&pid).cloned())
    }
}

/// Sink keeping every record it receives
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<ProcessEventRecord>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<ProcessEventRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Wait until at least `count` records arrived
    pub async fn wait_for(&self, count: usize) -> Vec<ProcessEventRecord> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let records = self.records();
            if records.len() >= count || tokio::time::Instant::now() >= deadline {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Poll `condition` until it holds or five seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}

impl RecordSink for CollectingSink {
    fn emit(&self, record: &ProcessEventRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}
