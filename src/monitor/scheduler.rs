//! Periodic maintenance timers
//!
//! Each timer runs on its own task. A tick that fails or panics is logged
//! and does not cancel later ticks.

use crate::models::MonitorError;
use anyhow::Result;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `tick` every `period`, first after one full period has elapsed.
    ///
    /// Fails without spawning anything if `period` is zero or too large to
    /// schedule.
    pub fn spawn_periodic<F>(
        &mut self,
        name: &'static str,
        period: Duration,
        mut tick: F,
    ) -> Result<(), MonitorError>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(MonitorError::InvalidConfig(format!("{} period must be greater than 0", name)));
        }
        let start = Instant::now().checked_add(period).ok_or_else(|| {
            MonitorError::InvalidConfig(format!("{} period of {}s is too large", name, period.as_secs()))
        })?;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match std::panic::catch_unwind(AssertUnwindSafe(&mut tick)) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::error!("Error during {}: {:#}", name, e),
                    Err(_) => log::error!("Timer {} panicked; continuing", name),
                }
            }
        });
        log::debug!("Scheduled {} every {}s", name, period.as_secs());
        self.tasks.push((name, task));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every timer. Ticks already running are not awaited.
    pub fn stop(&mut self) {
        for (name, task) in self.tasks.drain(..) {
            task.abort();
            log::debug!("Stopped {} timer", name);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
