//! Graceful shutdown of a group of subscriptions
//!
//! A [`ShutdownGroup`] plays the part of the resource manager that owns a
//! set of long-lived subscriptions, e.g. those feeding a transport endpoint.
//! Publishers are wrapped with [`ShutdownGroup::track`]; every subscription
//! made through them stays registered until it has terminated, or has been
//! cancelled with no signal still running in its subscriber.
//!
//! [`ShutdownGroup::shutdown`] cancels everything that is still open and
//! waits, up to a timeout, for each subscription to confirm. A subscription
//! that fails to confirm in time is reported as [`ShutdownError::Timeout`].
//!
//! ```rust
//! use std::time::Duration;
//!
//! use rxdemand::prelude::*;
//!
//! let group = ShutdownGroup::new();
//! let source = group.track(factory::never::<i32, ()>()).unwrap();
//!
//! let subscriber = TestSubscriber::unbounded();
//! source.subscribe(subscriber.clone());
//! assert_eq!(group.open(), 1);
//!
//! group.shutdown(Duration::from_secs(1)).unwrap();
//! assert_eq!(group.open(), 0);
//! assert!(group.track(factory::never::<i32, ()>()).is_err());
//! ```

use std::{
  sync::{
    Arc, Weak,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use crate::{
  error::ShutdownError,
  publisher::Publisher,
  subscriber::{BoxedSubscriber, Subscriber},
  subscription::{BoxedSubscription, DynamicSubscriptions, EmptySubscription, Subscription},
};

struct GroupState {
  open: DynamicSubscriptions<BoxedSubscription>,
  shut_down: bool,
}

struct GroupInner {
  state: Mutex<GroupState>,
  confirmed: Condvar,
}

impl GroupInner {
  fn deregister(&self, id: u64) {
    let removed = self.state.lock().open.remove(id);
    if removed.is_some() {
      self.confirmed.notify_all();
    }
    // Dropped outside the lock.
    drop(removed);
  }
}

#[derive(Clone)]
pub struct ShutdownGroup {
  inner: Arc<GroupInner>,
}

impl Default for ShutdownGroup {
  fn default() -> Self { Self::new() }
}

impl ShutdownGroup {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(GroupInner {
        state: Mutex::new(GroupState { open: DynamicSubscriptions::new(), shut_down: false }),
        confirmed: Condvar::new(),
      }),
    }
  }

  /// Wraps `publisher` so that its subscriptions belong to this group.
  pub fn track<P>(&self, publisher: P) -> Result<Tracked<P>, ShutdownError> {
    if self.is_shut_down() {
      return Err(ShutdownError::AlreadyShutDown);
    }
    Ok(Tracked { source: Arc::new(publisher), group: self.inner.clone() })
  }

  pub fn is_shut_down(&self) -> bool { self.inner.state.lock().shut_down }

  /// Number of subscriptions that have not yet confirmed.
  pub fn open(&self) -> usize { self.inner.state.lock().open.len() }

  /// Cancels every open subscription and blocks until all of them have
  /// confirmed or `timeout` has elapsed.
  ///
  /// Calling it again retries the wait; subscriptions made after the first
  /// call are cancelled as they arrive.
  pub fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
    // `None` for timeouts too large to represent: wait without a deadline.
    let deadline = Instant::now().checked_add(timeout);

    let to_cancel: SmallVec<[BoxedSubscription; 8]> = {
      let mut state = self.inner.state.lock();
      state.shut_down = true;
      state.open.iter().cloned().collect()
    };
    tracing::debug!(open = to_cancel.len(), "shutting down, cancelling open subscriptions");
    for subscription in to_cancel {
      subscription.cancel();
    }

    let mut state = self.inner.state.lock();
    while !state.open.is_empty() {
      match deadline {
        Some(deadline) => {
          if self
            .inner
            .confirmed
            .wait_until(&mut state, deadline)
            .timed_out()
          {
            break;
          }
        }
        None => self.inner.confirmed.wait(&mut state),
      }
    }

    let open = state.open.len();
    if open == 0 {
      return Ok(());
    }
    tracing::error!(open, ?timeout, "subscriptions did not confirm cancellation");
    Err(ShutdownError::Timeout { open, timeout })
  }
}

/// A publisher whose subscriptions are tracked by a [`ShutdownGroup`].
pub struct Tracked<P> {
  source: Arc<P>,
  group: Arc<GroupInner>,
}

impl<P> Clone for Tracked<P> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), group: self.group.clone() } }
}

impl<P, Item, Err> Publisher<Item, Err> for Tracked<P>
where
  P: Publisher<Item, Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    let tracked = {
      let mut state = self.group.state.lock();
      if state.shut_down {
        None
      } else {
        let id = state.open.reserve_id();
        let tracked = Arc::new_cyclic(|me| TrackedSubscriber {
          id,
          actual: subscriber.clone(),
          group: self.group.clone(),
          upstream: Mutex::new(None),
          busy: AtomicUsize::new(0),
          cancelled: AtomicBool::new(false),
          confirmed: AtomicBool::new(false),
          me: me.clone(),
        });
        state.open.insert(id, tracked.clone());
        Some(tracked)
      }
    };

    match tracked {
      Some(tracked) => self.source.subscribe(tracked),
      None => {
        tracing::debug!("subscribe after shutdown, cancelling");
        subscriber.on_subscribe(EmptySubscription::boxed());
      }
    }
  }
}

struct TrackedSubscriber<Item, Err> {
  id: u64,
  actual: BoxedSubscriber<Item, Err>,
  group: Arc<GroupInner>,
  upstream: Mutex<Option<BoxedSubscription>>,
  /// Signals currently running in `actual`.
  busy: AtomicUsize,
  cancelled: AtomicBool,
  confirmed: AtomicBool,
  me: Weak<Self>,
}

impl<Item, Err> TrackedSubscriber<Item, Err> {
  /// Runs `signal` unless cancelled. Returns `false` if it was skipped.
  fn enter(&self, signal: impl FnOnce(&BoxedSubscriber<Item, Err>)) -> bool {
    self.busy.fetch_add(1, Ordering::SeqCst);
    let run = !self.cancelled.load(Ordering::SeqCst);
    if run {
      signal(&self.actual);
    }
    if self.busy.fetch_sub(1, Ordering::SeqCst) == 1 && self.cancelled.load(Ordering::SeqCst) {
      self.confirm();
    }
    run
  }

  fn confirm(&self) {
    if !self.confirmed.swap(true, Ordering::AcqRel) {
      let upstream = self.upstream.lock().take();
      drop(upstream);
      self.group.deregister(self.id);
    }
  }
}

impl<Item, Err> Subscriber<Item, Err> for TrackedSubscriber<Item, Err>
where
  Item: 'static,
  Err: 'static,
{
  fn on_subscribe(&self, subscription: BoxedSubscription) {
    let Some(me) = self.me.upgrade() else {
      subscription.cancel();
      return;
    };
    *self.upstream.lock() = Some(subscription.clone());
    if self.cancelled.load(Ordering::SeqCst) {
      subscription.cancel();
    }
    self.enter(|actual| actual.on_subscribe(me));
  }

  fn on_next(&self, item: Item) { self.enter(|actual| actual.on_next(item)); }

  fn on_error(&self, err: Err) {
    if self.enter(|actual| actual.on_error(err)) {
      self.confirm();
    }
  }

  fn on_complete(&self) {
    if self.enter(|actual| actual.on_complete()) {
      self.confirm();
    }
  }
}

impl<Item, Err> Subscription for TrackedSubscriber<Item, Err>
where
  Item: 'static,
  Err: 'static,
{
  fn request(&self, n: u64) {
    let upstream = self.upstream.lock().clone();
    if let Some(upstream) = upstream {
      upstream.request(n);
    }
  }

  fn cancel(&self) {
    if self.cancelled.swap(true, Ordering::SeqCst) {
      return;
    }
    let upstream = self.upstream.lock().clone();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
    if self.busy.load(Ordering::SeqCst) == 0 {
      self.confirm();
    }
  }
}
