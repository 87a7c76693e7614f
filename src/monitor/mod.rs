pub mod correlator;
pub mod identity_cache;
pub mod polling;
pub mod process_tracker;
pub mod query;
pub mod resolver;
pub mod scheduler;
pub mod source;
pub mod subscription;

pub use correlator::EventCorrelator;
pub use identity_cache::IdentityCache;
pub use polling::PollingEventSource;
pub use process_tracker::ProcessTracker;
pub use query::ProcessQuery;
pub use resolver::{IdentityResolver, ResolveError, SystemIdentityResolver};
pub use scheduler::Scheduler;
pub use source::{EventSender, EventSubscription, ProcessEventSource};
pub use subscription::{FilterUpdate, SubscriptionManager};
