//! Agent module for background process auditing
//!
//! This module wires the monitoring core into a running agent:
//! - Configuration management with live reloads
//! - Structured audit logging
//! - Startup, periodic maintenance and graceful shutdown

pub mod config;
pub mod logging;

use crate::constants::{RELOAD_CHECK_INTERVAL, SHUTDOWN_GRACE_PERIOD};
use crate::daemon::config::{resolve_configuration, AgentConfiguration, ConfigWatcher};
use crate::daemon::logging::{AuditLogger, StatusReport};
use crate::filter::{FilterSet, SharedFilters};
use crate::models::MonitorError;
use crate::monitor::{
    EventCorrelator, FilterUpdate, IdentityCache, IdentityResolver, PollingEventSource,
    ProcessEventSource, Scheduler, SubscriptionManager, SystemIdentityResolver,
};
use crate::output::RecordSink;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Host collaborators the agent runs against
pub struct AgentServices {
    pub source: Arc<dyn ProcessEventSource>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub sink: Arc<dyn RecordSink>,
}

/// A running process audit agent
pub struct Agent {
    filters: Arc<SharedFilters>,
    cache: Arc<IdentityCache>,
    correlator: Arc<EventCorrelator>,
    subscriptions: Arc<SubscriptionManager>,
    scheduler: Scheduler,
    intake: Option<JoinHandle<()>>,
    cache_expiry: watch::Sender<Duration>,
    cleanup_interval: Duration,
    status_interval: Duration,
    logger: AuditLogger,
}

impl Agent {
    /// Build the monitoring pipeline and subscribe to process events.
    ///
    /// Must be called from within a tokio runtime. A subscription failure
    /// is returned and nothing is left running.
    pub fn start(
        config: &AgentConfiguration,
        config_path: Option<&Path>,
        services: AgentServices,
        logger: AuditLogger,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let monitor = config.monitor_config();

        let filter_set = FilterSet::new(&monitor.include_filters, &monitor.exclude_filters)?;
        let filters = Arc::new(SharedFilters::new(filter_set));
        let cache = Arc::new(IdentityCache::new());
        let correlator = Arc::new(EventCorrelator::new(
            Arc::clone(&filters),
            Arc::clone(&cache),
            services.resolver,
            services.sink,
            config.source.max_in_flight_events,
        ));

        let (events_tx, mut events_rx) = mpsc::channel(config.source.event_queue_capacity);
        let subscriptions = Arc::new(SubscriptionManager::new(
            services.source,
            Arc::clone(&filters),
            events_tx,
        ));

        // Timers are scheduled first; dropping the scheduler cancels them if
        // subscribing fails
        let (cache_expiry, expiry_rx) = watch::channel(monitor.cache_expiry);
        let mut scheduler = Scheduler::new();
        {
            let cache = Arc::clone(&cache);
            let logger = logger.clone();
            scheduler.spawn_periodic("cache cleanup", monitor.cleanup_interval, move || {
                let expiry = *expiry_rx.borrow();
                let removed = cache.sweep_expired(expiry, Instant::now());
                if removed > 0 {
                    logger.log_cache_cleanup(removed, cache.size());
                }
                Ok(())
            })?;
        }
        {
            let filters = Arc::clone(&filters);
            let cache = Arc::clone(&cache);
            let correlator = Arc::clone(&correlator);
            let subscriptions = Arc::clone(&subscriptions);
            let logger = logger.clone();
            scheduler.spawn_periodic("status report", monitor.status_interval, move || {
                logger.log_status(&build_status(&filters, &cache, &correlator, &subscriptions));
                Ok(())
            })?;
        }

        subscriptions.start()?;

        let intake = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    if !correlator.dispatch(event).await {
                        break;
                    }
                }
                log::debug!("Event intake stopped");
            })
        };

        logger.log_startup(config_path, std::process::id(), &filters.current());

        Ok(Self {
            filters,
            cache,
            correlator,
            subscriptions,
            scheduler,
            intake: Some(intake),
            cache_expiry,
            cleanup_interval: monitor.cleanup_interval,
            status_interval: monitor.status_interval,
            logger,
        })
    }

    /// Apply a reloaded configuration.
    ///
    /// Filters take effect immediately and the cache expiry on the next
    /// cleanup tick. Timer intervals are fixed for the agent's lifetime.
    pub fn apply_config(&self, config: &AgentConfiguration) -> Result<FilterUpdate, MonitorError> {
        let monitor = config.monitor_config();

        let previous_expiry = self.cache_expiry.send_replace(monitor.cache_expiry);
        if previous_expiry != monitor.cache_expiry {
            log::info!(
                "Cache expiry changed from {} to {} minutes",
                previous_expiry.as_secs() / 60,
                monitor.cache_expiry.as_secs() / 60
            );
        }
        if monitor.cleanup_interval != self.cleanup_interval
            || monitor.status_interval != self.status_interval
        {
            log::warn!("Cleanup and status interval changes take effect after a restart");
        }

        let update = match self
            .subscriptions
            .apply_filters(&monitor.include_filters, &monitor.exclude_filters)
        {
            Ok(update) => update,
            Err(e) => {
                self.logger
                    .log_error(&format!("Rejected filter update: {}", e), Some("config_reload"));
                return Err(e);
            }
        };

        let current = self.filters.current();
        match &update {
            FilterUpdate::Unchanged => log::debug!("Filter configuration unchanged"),
            FilterUpdate::Applied => self.logger.log_filters_updated(&current, "applied"),
            FilterUpdate::Resubscribed => self.logger.log_filters_updated(&current, "resubscribed"),
            FilterUpdate::Restored(reason) => {
                self.logger.log_filters_updated(&current, "previous subscription restored");
                self.logger.log_subscription_error(reason);
            }
            FilterUpdate::SubscriptionLost(reason) => {
                self.logger.log_filters_updated(&current, "subscription lost");
                self.logger.log_subscription_error(reason);
            }
        }
        Ok(update)
    }

    pub fn status(&self) -> StatusReport {
        build_status(&self.filters, &self.cache, &self.correlator, &self.subscriptions)
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub fn filters(&self) -> &Arc<SharedFilters> {
        &self.filters
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Expiry the next cleanup tick will use
    pub fn cache_expiry(&self) -> Duration {
        *self.cache_expiry.borrow()
    }

    /// Stop the agent.
    ///
    /// No record is emitted once this starts. In-flight events get up to
    /// `grace` to finish before the subscription is released.
    pub async fn shutdown(mut self, reason: &str, grace: Duration) {
        self.correlator.begin_shutdown();
        self.scheduler.stop();
        if let Some(intake) = self.intake.take() {
            intake.abort();
        }

        if !self.correlator.drain(grace).await {
            log::warn!(
                "{} event tasks still running after {}ms, abandoning them",
                self.correlator.in_flight(),
                grace.as_millis()
            );
        }

        self.subscriptions.stop();
        self.logger.log_shutdown(reason, self.cache.size());
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if let Some(intake) = self.intake.take() {
            intake.abort();
        }
    }
}

fn build_status(
    filters: &SharedFilters,
    cache: &IdentityCache,
    correlator: &EventCorrelator,
    subscriptions: &SubscriptionManager,
) -> StatusReport {
    let current = filters.current();
    StatusReport {
        cache_entries: cache.size(),
        include_filters: current.include_count(),
        exclude_filters: current.exclude_count(),
        subscription_active: subscriptions.is_active(),
        in_flight: correlator.in_flight(),
        counts: correlator.stats(),
    }
}

/// Run the agent against the local process table until interrupted
pub async fn run_agent(config_path: Option<PathBuf>) -> Result<()> {
    let (config, path) = resolve_configuration(config_path.as_deref())
        .context("Failed to load configuration")?;

    // Graceful degradation if a logger is already installed
    if let Err(e) = logging::init_logging(config.log_level()?) {
        eprintln!("Warning: {}", e);
    }

    let logger = AuditLogger::new(config.logging.stdout);
    let services = AgentServices {
        source: Arc::new(PollingEventSource::new(config.polling_duration())?),
        resolver: Arc::new(SystemIdentityResolver::new()),
        sink: Arc::new(logger.clone()),
    };

    let agent = Agent::start(&config, path.as_deref(), services, logger.clone())
        .context("Failed to start process monitoring")?;

    let mut watcher = path.map(ConfigWatcher::new);
    let mut reload = tokio::time::interval(RELOAD_CHECK_INTERVAL);
    reload.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let reason = loop {
        tokio::select! {
            reason = &mut shutdown => break reason,
            _ = reload.tick() => {
                let Some(result) = watcher.as_mut().and_then(ConfigWatcher::poll) else {
                    continue;
                };
                match result {
                    Ok(new_config) => {
                        log::info!("Configuration file changed, reloading");
                        // Failures are logged by apply_config
                        let _ = agent.apply_config(&new_config);
                    }
                    Err(e) => logger.log_error(
                        &format!("Ignoring invalid configuration: {}", e),
                        Some("config_reload"),
                    ),
                }
            }
        }
    };

    agent.shutdown(reason, SHUTDOWN_GRACE_PERIOD).await;
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM; returns which one arrived
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "interrupt",
            _ = terminate.recv() => "terminate",
        },
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            "interrupt"
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
