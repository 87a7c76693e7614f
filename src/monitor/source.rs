//! Process event source abstraction
//!
//! A source delivers raw creation and termination notifications for the
//! processes selected by a `ProcessQuery` into a bounded channel. Delivery is
//! asynchronous and may be concurrent; consumers must not assume ordering
//! across different processes.

use crate::models::{MonitorError, RawProcessEvent};
use crate::monitor::query::ProcessQuery;
use tokio::sync::mpsc;

/// Channel a subscription delivers raw events into
pub type EventSender = mpsc::Sender<RawProcessEvent>;

/// A source of process lifecycle notifications
pub trait ProcessEventSource: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Start delivering events matching `query` into `events`.
    ///
    /// The subscription runs until the returned handle is stopped or the
    /// receiving side of the channel is dropped.
    fn subscribe(
        &self,
        query: &ProcessQuery,
        events: EventSender,
    ) -> Result<Box<dyn EventSubscription>, MonitorError>;
}

/// Handle to an active subscription
pub trait EventSubscription: Send {
    /// Stop delivery and release the underlying resources
    fn stop(self: Box<Self>);
}
