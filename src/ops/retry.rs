//! Retry operator implementation
//!
//! `retry` resubscribes to its source when the source signals an error,
//! either a bounded number of times or without limit. The downstream sees a
//! single subscription: demand it requested is carried over from one attempt
//! to the next, and items already delivered by a failed attempt are deducted
//! from what the next attempt is asked for.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::{
//!   Arc,
//!   atomic::{AtomicUsize, Ordering},
//! };
//!
//! use rxdemand::prelude::*;
//!
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let source = {
//!   let attempts = attempts.clone();
//!   factory::defer(move || -> BoxedPublisher<i32, &'static str> {
//!     if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
//!       Arc::new(factory::throw_err::<i32, _>("connection reset"))
//!     } else {
//!       Arc::new(factory::from_iter::<_, &str>(vec![1, 2, 3]))
//!     }
//!   })
//! };
//!
//! let subscriber = TestSubscriber::unbounded();
//! source.retry(3).unwrap().subscribe(subscriber.clone());
//!
//! assert_eq!(subscriber.values(), vec![1, 2, 3]);
//! assert_eq!(subscriber.completions(), 1);
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! ```
//!
//! Exhausting the bound forwards the last error:
//!
//! ```rust
//! use rxdemand::prelude::*;
//!
//! let subscriber = TestSubscriber::<i32, &str>::unbounded();
//! factory::throw_err::<i32, _>("boom")
//!   .retry(2)
//!   .unwrap()
//!   .subscribe(subscriber.clone());
//!
//! assert_eq!(subscriber.errors(), vec!["boom"]);
//! ```

use std::sync::{
  Arc, Weak,
  atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::{
  error::ConfigError,
  ops::trampoline::ResubscribeDriver,
  publisher::Publisher,
  subscriber::{BoxedSubscriber, Subscriber},
  subscription::{BoxedSubscription, Subscription, SubscriptionArbiter},
};

/// Remaining-attempts value meaning "retry forever".
const UNBOUNDED_RETRIES: u64 = u64::MAX;

/// How many times a failed source may be resubscribed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryBound {
  /// At most this many resubscriptions, i.e. `n + 1` attempts in total.
  Times(u64),
  Unbounded,
}

impl RetryBound {
  /// Validates a signed bound. Negative values are rejected, `i64::MAX` is
  /// treated as unbounded.
  pub fn new(times: i64) -> Result<Self, ConfigError> {
    match times {
      i64::MAX => Ok(RetryBound::Unbounded),
      n if n < 0 => Err(ConfigError::NegativeRetryBound(n)),
      n => Ok(RetryBound::Times(n as u64)),
    }
  }

  fn remaining(self) -> u64 {
    match self {
      RetryBound::Times(n) => n.min(UNBOUNDED_RETRIES - 1),
      RetryBound::Unbounded => UNBOUNDED_RETRIES,
    }
  }
}

impl TryFrom<i64> for RetryBound {
  type Error = ConfigError;

  fn try_from(times: i64) -> Result<Self, Self::Error> { RetryBound::new(times) }
}

impl From<u64> for RetryBound {
  fn from(times: u64) -> Self { RetryBound::Times(times) }
}

/// The Retry operator struct.
pub struct Retry<S> {
  source: Arc<S>,
  bound: RetryBound,
}

impl<S> Retry<S> {
  pub fn new(source: S, bound: RetryBound) -> Self { Self { source: Arc::new(source), bound } }

  pub fn bound(&self) -> RetryBound { self.bound }
}

impl<S> Clone for Retry<S> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), bound: self.bound } }
}

impl<S, Item, Err> Publisher<Item, Err> for Retry<S>
where
  S: Publisher<Item, Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    let parent = Arc::new_cyclic(|me| RetrySubscriber {
      source: self.source.clone(),
      actual: Mutex::new(Some(subscriber.clone())),
      remaining: AtomicU64::new(self.bound.remaining()),
      arbiter: SubscriptionArbiter::new(),
      driver: ResubscribeDriver::new(),
      me: me.clone(),
    });

    // Hand the downstream its subscription before the first attempt, so that
    // a request or cancel it issues in `on_subscribe` is already in effect.
    subscriber.on_subscribe(parent.clone());
    if !parent.arbiter.is_cancelled() {
      parent.resubscribe();
    }
  }
}

/// Subscriber that the retry operator subscribes to each attempt.
///
/// It is also the subscription given to the downstream: the same object is
/// re-subscribed to the source on every attempt.
pub struct RetrySubscriber<S, Item, Err> {
  source: Arc<S>,
  /// The downstream; released once the sequence terminates or is cancelled.
  actual: Mutex<Option<BoxedSubscriber<Item, Err>>>,
  remaining: AtomicU64,
  arbiter: SubscriptionArbiter,
  driver: ResubscribeDriver,
  me: Weak<Self>,
}

impl<S, Item, Err> RetrySubscriber<S, Item, Err> {
  fn actual(&self) -> Option<BoxedSubscriber<Item, Err>> { self.actual.lock().clone() }

  /// Takes the downstream out; nothing is forwarded to it afterwards.
  fn release(&self) -> Option<BoxedSubscriber<Item, Err>> { self.actual.lock().take() }
}

impl<S, Item, Err> RetrySubscriber<S, Item, Err>
where
  S: Publisher<Item, Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  fn resubscribe(&self) {
    let Some(me) = self.me.upgrade() else {
      return;
    };
    let me: BoxedSubscriber<Item, Err> = me;
    self
      .driver
      .resubscribe(&self.arbiter, || self.source.subscribe(me.clone()));
  }
}

impl<S, Item, Err> Subscriber<Item, Err> for RetrySubscriber<S, Item, Err>
where
  S: Publisher<Item, Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  fn on_subscribe(&self, subscription: BoxedSubscription) { self.arbiter.set(subscription); }

  fn on_next(&self, item: Item) {
    if self.arbiter.is_cancelled() {
      return;
    }
    self.driver.record_produced();
    if let Some(actual) = self.actual() {
      actual.on_next(item);
    }
  }

  fn on_error(&self, err: Err) {
    if self.arbiter.is_cancelled() {
      return;
    }

    let remaining = self.remaining.load(Ordering::Acquire);
    if remaining != UNBOUNDED_RETRIES {
      if remaining == 0 {
        tracing::debug!("retry bound exhausted, forwarding error");
        if self.arbiter.try_cancel() {
          if let Some(actual) = self.release() {
            actual.on_error(err);
          }
        }
        return;
      }
      self.remaining.store(remaining - 1, Ordering::Release);
    }

    tracing::debug!(remaining = remaining.saturating_sub(1), "source failed, resubscribing");
    self.resubscribe();
  }

  fn on_complete(&self) {
    if self.arbiter.try_cancel() {
      if let Some(actual) = self.release() {
        actual.on_complete();
      }
    }
  }
}

impl<S, Item, Err> Subscription for RetrySubscriber<S, Item, Err>
where
  S: Send + Sync,
  Item: 'static,
  Err: 'static,
{
  fn request(&self, n: u64) { self.arbiter.request(n); }

  fn cancel(&self) {
    if self.arbiter.try_cancel() {
      drop(self.release());
    }
  }
}
