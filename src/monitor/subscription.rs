//! Subscription lifecycle
//!
//! Owns the active event subscription and rebuilds it whenever the filter
//! set changes. Filter changes are serialized: two concurrent updates never
//! interleave their teardown and resubscribe steps.

use crate::filter::SharedFilters;
use crate::models::MonitorError;
use crate::monitor::query::ProcessQuery;
use crate::monitor::source::{EventSender, EventSubscription, ProcessEventSource};
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of `SubscriptionManager::apply_filters`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterUpdate {
    /// Same content as the filters in effect; nothing was touched
    Unchanged,
    /// Filters swapped; no subscription was running
    Applied,
    /// Filters swapped and the subscription rebuilt
    Resubscribed,
    /// Filters swapped but the new subscription failed; the previous query was restored
    Restored(String),
    /// Filters swapped and no subscription could be established
    SubscriptionLost(String),
}

#[derive(Default)]
struct SubscriptionState {
    active: Option<Box<dyn EventSubscription>>,
    query: Option<ProcessQuery>,
    started: bool,
    resubscriptions: u64,
}

pub struct SubscriptionManager {
    source: Arc<dyn ProcessEventSource>,
    filters: Arc<SharedFilters>,
    events: EventSender,
    state: Mutex<SubscriptionState>,
}

impl SubscriptionManager {
    pub fn new(
        source: Arc<dyn ProcessEventSource>,
        filters: Arc<SharedFilters>,
        events: EventSender,
    ) -> Self {
        Self {
            source,
            filters,
            events,
            state: Mutex::new(SubscriptionState::default()),
        }
    }

    /// Query for the filters currently in effect
    pub fn build_query(&self) -> ProcessQuery {
        ProcessQuery::from_filters(&self.filters.current())
    }

    /// Establish the initial subscription. Failure here is fatal to the agent.
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut state = self.lock();
        if state.active.is_some() {
            return Ok(());
        }
        let query = self.build_query();
        let subscription = self.source.subscribe(&query, self.events.clone())?;
        log::info!("Subscribed to {} for {}", self.source.name(), query);

        state.active = Some(subscription);
        state.query = Some(query);
        state.started = true;
        Ok(())
    }

    /// Replace the filter lists and, if they changed, rebuild the subscription.
    ///
    /// Invalid patterns are rejected and leave both the filters and the
    /// subscription untouched. A failed resubscribe is logged and reported in
    /// the returned `FilterUpdate`; it is never fatal.
    pub fn apply_filters<I, E>(&self, includes: &[I], excludes: &[E]) -> Result<FilterUpdate, MonitorError>
    where
        I: AsRef<str>,
        E: AsRef<str>,
    {
        let mut state = self.lock();

        if !self.filters.update_filters(includes, excludes)? {
            return Ok(FilterUpdate::Unchanged);
        }
        if !state.started {
            return Ok(FilterUpdate::Applied);
        }

        Ok(self.resubscribe(&mut state))
    }

    fn resubscribe(&self, state: &mut SubscriptionState) -> FilterUpdate {
        if let Some(previous) = state.active.take() {
            previous.stop();
        }
        let previous_query = state.query.take();
        state.resubscriptions += 1;

        let query = self.build_query();
        match self.source.subscribe(&query, self.events.clone()) {
            Ok(subscription) => {
                log::info!("Resubscribed to {} for {}", self.source.name(), query);
                state.active = Some(subscription);
                state.query = Some(query);
                FilterUpdate::Resubscribed
            }
            Err(e) => {
                log::error!("Error updating process monitoring subscription: {}", e);
                let Some(previous_query) = previous_query else {
                    return FilterUpdate::SubscriptionLost(e.to_string());
                };
                match self.source.subscribe(&previous_query, self.events.clone()) {
                    Ok(subscription) => {
                        log::warn!("Restored previous subscription for {}", previous_query);
                        state.active = Some(subscription);
                        state.query = Some(previous_query);
                        FilterUpdate::Restored(e.to_string())
                    }
                    Err(restore_err) => {
                        log::error!("Could not restore previous subscription: {}", restore_err);
                        FilterUpdate::SubscriptionLost(e.to_string())
                    }
                }
            }
        }
    }

    /// Stop and release the active subscription
    pub fn stop(&self) {
        let mut state = self.lock();
        if let Some(subscription) = state.active.take() {
            subscription.stop();
            log::debug!("Released {} subscription", self.source.name());
        }
        state.query = None;
        state.started = false;
    }

    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Number of times the subscription was torn down for a filter change
    pub fn resubscription_count(&self) -> u64 {
        self.lock().resubscriptions
    }

    /// Description of the query the active subscription delivers
    pub fn active_query(&self) -> Option<String> {
        self.lock().query.as_ref().map(ToString::to_string)
    }

    fn lock(&self) -> MutexGuard<'_, SubscriptionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
