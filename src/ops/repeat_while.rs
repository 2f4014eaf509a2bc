//! RepeatWhile operator implementation
//!
//! `repeat_while` resubscribes to its source each time the source completes,
//! for as long as a predicate allows it. The predicate is evaluated exactly
//! once per completion; errors are forwarded without consulting it.
//!
//! # Examples
//!
//! ```rust
//! use rxdemand::prelude::*;
//!
//! let mut passes = 0;
//! let subscriber = TestSubscriber::unbounded();
//! factory::from_iter::<_, ()>(vec!['a', 'b'])
//!   .repeat_while(move || {
//!     passes += 1;
//!     passes < 3
//!   })
//!   .subscribe(subscriber.clone());
//!
//! assert_eq!(subscriber.values(), vec!['a', 'b', 'a', 'b', 'a', 'b']);
//! assert_eq!(subscriber.completions(), 1);
//! ```
//!
//! A failing predicate ends the sequence with its error instead of the
//! completion:
//!
//! ```rust
//! use rxdemand::prelude::*;
//!
//! let subscriber = TestSubscriber::unbounded();
//! factory::from_iter(vec![1])
//!   .try_repeat_while(|| Err("state store unavailable"))
//!   .subscribe(subscriber.clone());
//!
//! assert_eq!(subscriber.values(), vec![1]);
//! assert_eq!(subscriber.errors(), vec!["state store unavailable"]);
//! assert_eq!(subscriber.completions(), 0);
//! ```

use std::{
  marker::PhantomData,
  sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::{
  ops::trampoline::ResubscribeDriver,
  publisher::Publisher,
  subscriber::{BoxedSubscriber, Subscriber},
  subscription::{BoxedSubscription, Subscription, SubscriptionArbiter},
};

/// Decides, after each completion, whether the source is subscribed again.
pub trait RepeatPredicate<Err>: Send {
  /// `Ok(true)` repeats, `Ok(false)` completes, `Err` terminates with that
  /// error.
  fn evaluate(&mut self) -> Result<bool, Err>;
}

/// Infallible predicate adapter used by `repeat_while`.
pub struct WhileFn<F>(pub F);

impl<F, Err> RepeatPredicate<Err> for WhileFn<F>
where
  F: FnMut() -> bool + Send,
{
  #[inline]
  fn evaluate(&mut self) -> Result<bool, Err> { Ok((self.0)()) }
}

/// Fallible predicate adapter used by `try_repeat_while`.
pub struct TryWhileFn<F>(pub F);

impl<F, Err> RepeatPredicate<Err> for TryWhileFn<F>
where
  F: FnMut() -> Result<bool, Err> + Send,
{
  #[inline]
  fn evaluate(&mut self) -> Result<bool, Err> { (self.0)() }
}

/// The RepeatWhile operator struct.
///
/// The predicate is shared by every subscription made through this value:
/// a stateful predicate keeps its state across downstream subscriptions.
pub struct RepeatWhile<S, P> {
  source: Arc<S>,
  predicate: Arc<Mutex<P>>,
}

impl<S, P> RepeatWhile<S, P> {
  pub fn new(source: S, predicate: P) -> Self {
    Self { source: Arc::new(source), predicate: Arc::new(Mutex::new(predicate)) }
  }
}

impl<S, P> Clone for RepeatWhile<S, P> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), predicate: self.predicate.clone() } }
}

impl<S, P, Item, Err> Publisher<Item, Err> for RepeatWhile<S, P>
where
  S: Publisher<Item, Err> + 'static,
  P: RepeatPredicate<Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    let parent = Arc::new_cyclic(|me| RepeatWhileSubscriber {
      source: self.source.clone(),
      predicate: self.predicate.clone(),
      actual: Mutex::new(Some(subscriber.clone())),
      arbiter: SubscriptionArbiter::new(),
      driver: ResubscribeDriver::new(),
      me: me.clone(),
      _err: PhantomData,
    });

    subscriber.on_subscribe(parent.clone());
    if !parent.arbiter.is_cancelled() {
      parent.resubscribe();
    }
  }
}

/// Subscriber that the repeat operator subscribes to each pass over the
/// source; it doubles as the downstream's subscription.
pub struct RepeatWhileSubscriber<S, P, Item, Err> {
  source: Arc<S>,
  predicate: Arc<Mutex<P>>,
  /// The downstream; released once the sequence terminates or is cancelled.
  actual: Mutex<Option<BoxedSubscriber<Item, Err>>>,
  arbiter: SubscriptionArbiter,
  driver: ResubscribeDriver,
  me: Weak<Self>,
  _err: PhantomData<fn(Err)>,
}

impl<S, P, Item, Err> RepeatWhileSubscriber<S, P, Item, Err> {
  fn actual(&self) -> Option<BoxedSubscriber<Item, Err>> { self.actual.lock().clone() }

  fn release(&self) -> Option<BoxedSubscriber<Item, Err>> { self.actual.lock().take() }
}

impl<S, P, Item, Err> RepeatWhileSubscriber<S, P, Item, Err>
where
  S: Publisher<Item, Err> + 'static,
  P: RepeatPredicate<Err> + 'static,
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

impl<S, P, Item, Err> Subscriber<Item, Err> for RepeatWhileSubscriber<S, P, Item, Err>
where
  S: Publisher<Item, Err> + 'static,
  P: RepeatPredicate<Err> + 'static,
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
    if self.arbiter.try_cancel() {
      if let Some(actual) = self.release() {
        actual.on_error(err);
      }
    }
  }

  fn on_complete(&self) {
    if self.arbiter.is_cancelled() {
      return;
    }

    // The guard must be gone before resubscribing: a synchronous source
    // completes again from inside `resubscribe`.
    let decision = self.predicate.lock().evaluate();
    match decision {
      Ok(true) => {
        tracing::debug!("source completed, repeating");
        self.resubscribe();
      }
      Ok(false) => {
        if self.arbiter.try_cancel() {
          if let Some(actual) = self.release() {
            actual.on_complete();
          }
        }
      }
      Err(err) => {
        tracing::debug!("repeat predicate failed, terminating with its error");
        if self.arbiter.try_cancel() {
          if let Some(actual) = self.release() {
            actual.on_error(err);
          }
        }
      }
    }
  }
}

impl<S, P, Item, Err> Subscription for RepeatWhileSubscriber<S, P, Item, Err>
where
  S: Send + Sync,
  P: Send,
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
