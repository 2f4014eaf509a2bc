//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Errors
pub use crate::error::{ConfigError, ShutdownError};
// Creation/Factories
pub use crate::factory;
// Core traits
pub use crate::publisher::{BoxedPublisher, Publisher, PublisherExt};
pub use crate::subscriber::{BoxedSubscriber, FnSubscriber, Subscriber};
pub use crate::subscription::{
  BoxedSubscription, EmptySubscription, Subscription, SubscriptionArbiter, SubscriptionGuard,
};
// Demand
pub use crate::demand::UNBOUNDED_DEMAND;
// Operators
pub use crate::ops::{IntoStream, RepeatWhile, Retry, RetryBound, SubscribeOn};
// Schedulers
#[cfg(feature = "futures-scheduler")]
pub use crate::scheduler::default_thread_pool;
pub use crate::scheduler::{ImmediateScheduler, Scheduler};
// Shutdown
pub use crate::shutdown::{ShutdownGroup, Tracked};
// Testing
pub use crate::test_subscriber::TestSubscriber;
