//! # rxdemand: demand-driven resubscription for Rust
//!
//! Backpressure-aware `retry` and `repeat_while` operators over a
//! reactive-streams style protocol: subscribers request `n` items through a
//! subscription, publishers never emit more than was requested, and a
//! resubscribing operator carries the outstanding demand over from one attempt
//! of its source to the next.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxdemand::prelude::*;
//!
//! let subscriber = TestSubscriber::new(4);
//! factory::from_iter::<_, ()>(vec![1, 2, 3])
//!   .repeat_while(|| true)
//!   .subscribe(subscriber.clone());
//!
//! // The predicate would repeat forever, but only 4 items were requested.
//! assert_eq!(subscriber.values(), vec![1, 2, 3, 1]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Re-obtainable source; every `subscribe` is a new attempt |
//! | [`Subscriber`] | Consumes `on_next`, `on_error`, and `on_complete` signals |
//! | [`Subscription`] | Handle to request demand or cancel |
//! | [`SubscriptionArbiter`] | One downstream subscription over many upstream attempts |
//! | [`ResubscribeDriver`] | Turns synchronous resubscription into a loop |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): `futures::executor::ThreadPool` as a
//!   [`Scheduler`]
//! - **`tokio-scheduler`**: `tokio::runtime::Handle` as a [`Scheduler`]
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`SubscriptionArbiter`]: subscription::SubscriptionArbiter
//! [`ResubscribeDriver`]: ops::trampoline::ResubscribeDriver
//! [`Scheduler`]: scheduler::Scheduler

pub mod demand;
pub mod error;
pub mod factory;
pub mod ops;
pub mod prelude;
pub mod publisher;
pub mod scheduler;
pub mod shutdown;
pub mod subscriber;
pub mod subscription;
pub mod test_subscriber;

pub use prelude::*;
