//! SubscriptionArbiter: one downstream subscription over a sequence of
//! upstream attempts
//!
//! The arbiter is the handle a resubscribing operator gives to its
//! downstream. Demand requested downstream is recorded in a ledger and
//! forwarded to whichever upstream handle is currently active; when the
//! operator swaps in the handle of a new attempt, the outstanding part of the
//! ledger is re-issued to it.
//!
//! # Concurrency
//!
//! Three parties mutate the arbiter concurrently: the consumer (`request`,
//! `cancel`), the producer of the active attempt (`produced`), and the
//! resubscription loop (`set`). They are serialized with a work-in-progress
//! counter instead of a lock:
//!
//! - the caller that moves `wip` from 0 to 1 owns `current` and `requested`
//!   and applies its change directly;
//! - every other caller parks its change in one of the `missed_*` fields and
//!   bumps `wip`, and the owner folds the missed changes in before it leaves.
//!
//! Calls into upstream handles (`request`, `cancel`) are made after the
//! owner has released its critical section, so a handle that re-enters the
//! arbiter synchronously cannot deadlock it. The `parking_lot` mutexes
//! around the handle slots are only held to move an `Arc` in or out.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{BoxedSubscription, Subscription};
use crate::demand::{UNBOUNDED_DEMAND, add_cap, get_and_add_cap, sub_produced, validate};

#[derive(Default)]
pub struct SubscriptionArbiter {
  /// Active upstream handle, owned by the `wip` winner.
  current: Mutex<Option<BoxedSubscription>>,
  /// Outstanding demand not yet satisfied, owned by the `wip` winner.
  requested: AtomicU64,
  unbounded: AtomicBool,
  missed_subscription: Mutex<Option<BoxedSubscription>>,
  missed_requested: AtomicU64,
  missed_produced: AtomicU64,
  wip: AtomicUsize,
  cancelled: AtomicBool,
}

impl SubscriptionArbiter {
  pub fn new() -> Self { Self::default() }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }

  /// Whether the ledger has saturated; produced items are no longer counted.
  #[inline]
  pub fn is_unbounded(&self) -> bool { self.unbounded.load(Ordering::Acquire) }

  /// Outstanding demand as last settled by the `wip` owner.
  ///
  /// Changes parked by concurrent callers are not included.
  pub fn requested(&self) -> u64 { self.requested.load(Ordering::Acquire) }

  /// Installs `subscription` as the active upstream handle and issues the
  /// outstanding demand to it.
  ///
  /// The previous handle is dropped without being cancelled: by the time an
  /// operator swaps, the previous attempt has already terminated. After
  /// `cancel` the new handle is cancelled straight away.
  pub fn set(&self, subscription: BoxedSubscription) {
    if self.is_cancelled() {
      subscription.cancel();
      return;
    }

    if self.try_enter() {
      let previous = self.current.lock().replace(subscription.clone());
      drop(previous);
      let outstanding = self.requested.load(Ordering::Relaxed);
      tracing::trace!(outstanding, "arbiter swapped upstream subscription");
      self.leave();
      if outstanding != 0 {
        subscription.request(outstanding);
      }
      return;
    }

    let previous = self.missed_subscription.lock().replace(subscription);
    drop(previous);
    self.drain();
  }

  /// Records `n` more items of downstream demand and forwards them to the
  /// active handle. Demand requested before any handle is installed is kept
  /// and issued to the first one.
  pub fn request(&self, n: u64) {
    if !validate(n) || self.is_unbounded() {
      return;
    }

    if self.try_enter() {
      let requested = self.requested.load(Ordering::Relaxed);
      if requested != UNBOUNDED_DEMAND {
        let requested = add_cap(requested, n);
        self.requested.store(requested, Ordering::Relaxed);
        if requested == UNBOUNDED_DEMAND {
          self.unbounded.store(true, Ordering::Release);
        }
      }
      let target = self.current.lock().clone();
      self.leave();
      if let Some(target) = target {
        target.request(n);
      }
      return;
    }

    get_and_add_cap(&self.missed_requested, n);
    self.drain();
  }

  /// Deducts `n` delivered items from the ledger.
  ///
  /// Resubscribing operators call this once per swap with the number of items
  /// the finished attempt delivered, so that the next attempt is only asked
  /// for what is still outstanding.
  pub fn produced(&self, n: u64) {
    if n == 0 || self.is_unbounded() {
      return;
    }

    if self.try_enter() {
      let requested = self.requested.load(Ordering::Relaxed);
      if requested != UNBOUNDED_DEMAND {
        self.requested.store(sub_produced(requested, n), Ordering::Relaxed);
      } else {
        self.unbounded.store(true, Ordering::Release);
      }
      self.leave();
      return;
    }

    get_and_add_cap(&self.missed_produced, n);
    self.drain();
  }

  /// Cancels the active handle; subsequent `set` and `request` are no-ops.
  pub fn cancel(&self) { self.try_cancel(); }

  /// Like [`cancel`](Self::cancel), but reports whether this call was the one
  /// that flipped the flag. Operators use it to make terminal signals
  /// exclusive: only the caller that wins the flip may forward one.
  pub fn try_cancel(&self) -> bool {
    if self.cancelled.swap(true, Ordering::AcqRel) {
      return false;
    }
    self.drain();
    true
  }

  #[inline]
  fn try_enter(&self) -> bool {
    self.wip.load(Ordering::Acquire) == 0
      && self
        .wip
        .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
  }

  /// Releases the fast-path ownership, draining whatever was parked meanwhile.
  #[inline]
  fn leave(&self) {
    if self.wip.fetch_sub(1, Ordering::AcqRel) != 1 {
      self.drain_loop();
    }
  }

  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    self.drain_loop();
  }

  fn drain_loop(&self) {
    let mut missed = 1;
    let mut request_amount = 0u64;
    let mut request_target: Option<BoxedSubscription> = None;

    loop {
      let missed_subscription = self.missed_subscription.lock().take();
      let missed_requested = self.take_missed(&self.missed_requested);
      let missed_produced = self.take_missed(&self.missed_produced);
      tracing::trace!(
        missed_requested,
        missed_produced,
        swapped = missed_subscription.is_some(),
        "arbiter drain iteration"
      );

      if self.is_cancelled() {
        let current = self.current.lock().take();
        request_target = None;
        if let Some(current) = current {
          current.cancel();
        }
        if let Some(missed_subscription) = missed_subscription {
          missed_subscription.cancel();
        }
      } else {
        let mut requested = self.requested.load(Ordering::Relaxed);
        if requested != UNBOUNDED_DEMAND {
          requested = add_cap(requested, missed_requested);
          if requested != UNBOUNDED_DEMAND {
            requested = sub_produced(requested, missed_produced);
          } else {
            self.unbounded.store(true, Ordering::Release);
          }
          self.requested.store(requested, Ordering::Relaxed);
        }

        if let Some(next) = missed_subscription {
          let previous = self.current.lock().replace(next.clone());
          drop(previous);
          tracing::trace!(outstanding = requested, "arbiter swapped upstream subscription");
          // A fresh handle has seen no demand yet, so it gets the whole
          // outstanding ledger; amounts collected for the previous handle in
          // earlier iterations are already part of it.
          if requested != 0 {
            request_amount = requested;
            request_target = Some(next);
          } else {
            request_amount = 0;
            request_target = None;
          }
        } else if missed_requested != 0 {
          if let Some(current) = self.current.lock().clone() {
            request_amount = add_cap(request_amount, missed_requested);
            request_target = Some(current);
          }
        }
      }

      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        if let Some(target) = request_target {
          if request_amount != 0 {
            target.request(request_amount);
          }
        }
        return;
      }
    }
  }

  #[inline]
  fn take_missed(&self, field: &AtomicU64) -> u64 {
    if field.load(Ordering::Acquire) == 0 { 0 } else { field.swap(0, Ordering::AcqRel) }
  }
}

impl Subscription for SubscriptionArbiter {
  #[inline]
  fn request(&self, n: u64) { SubscriptionArbiter::request(self, n) }

  #[inline]
  fn cancel(&self) { SubscriptionArbiter::cancel(self) }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{Arc, Barrier},
    thread,
  };

  use super::*;

  #[derive(Default)]
  struct Upstream {
    requested: AtomicU64,
    cancelled: AtomicUsize,
  }

  impl Upstream {
    fn requested(&self) -> u64 { self.requested.load(Ordering::SeqCst) }

    fn cancelled(&self) -> usize { self.cancelled.load(Ordering::SeqCst) }
  }

  impl Subscription for Upstream {
    fn request(&self, n: u64) {
      get_and_add_cap(&self.requested, n);
    }

    fn cancel(&self) { self.cancelled.fetch_add(1, Ordering::SeqCst); }
  }

  #[rxdemand_macro::test]
  fn request_before_set_is_issued_to_first_handle() {
    let arbiter = SubscriptionArbiter::new();
    arbiter.request(3);
    arbiter.request(4);

    let upstream = Arc::new(Upstream::default());
    arbiter.set(upstream.clone());
    assert_eq!(upstream.requested(), 7);
  }

  #[rxdemand_macro::test]
  fn request_is_forwarded_as_delta() {
    let arbiter = SubscriptionArbiter::new();
    let upstream = Arc::new(Upstream::default());
    arbiter.set(upstream.clone());

    arbiter.request(2);
    arbiter.request(5);
    assert_eq!(upstream.requested(), 7);
    assert_eq!(arbiter.requested(), 7);
  }

  #[rxdemand_macro::test]
  fn swap_issues_only_outstanding_demand() {
    let arbiter = SubscriptionArbiter::new();
    let first = Arc::new(Upstream::default());
    arbiter.set(first.clone());
    arbiter.request(10);

    // The first attempt delivered 4 items before it terminated.
    arbiter.produced(4);
    let second = Arc::new(Upstream::default());
    arbiter.set(second.clone());

    assert_eq!(first.requested(), 10);
    assert_eq!(second.requested(), 6);
    assert_eq!(first.cancelled(), 0);
  }

  #[rxdemand_macro::test]
  fn swap_with_nothing_outstanding_requests_nothing() {
    let arbiter = SubscriptionArbiter::new();
    arbiter.request(2);
    arbiter.produced(2);
    let upstream = Arc::new(Upstream::default());
    arbiter.set(upstream.clone());
    assert_eq!(upstream.requested(), 0);
  }

  #[rxdemand_macro::test]
  fn over_production_is_clamped() {
    let arbiter = SubscriptionArbiter::new();
    arbiter.request(1);
    arbiter.produced(5);
    assert_eq!(arbiter.requested(), 0);
  }

  #[rxdemand_macro::test]
  fn saturated_demand_stays_unbounded() {
    let arbiter = SubscriptionArbiter::new();
    let upstream = Arc::new(Upstream::default());
    arbiter.set(upstream.clone());
    arbiter.request(UNBOUNDED_DEMAND - 1);
    arbiter.request(10);
    assert!(arbiter.is_unbounded());

    arbiter.produced(1_000);
    let next = Arc::new(Upstream::default());
    arbiter.set(next.clone());
    assert_eq!(next.requested(), UNBOUNDED_DEMAND);
  }

  #[rxdemand_macro::test]
  fn cancel_is_idempotent_and_final() {
    let arbiter = SubscriptionArbiter::new();
    let upstream = Arc::new(Upstream::default());
    arbiter.set(upstream.clone());

    assert!(arbiter.try_cancel());
    assert!(!arbiter.try_cancel());
    arbiter.cancel();
    assert_eq!(upstream.cancelled(), 1);

    arbiter.request(5);
    assert_eq!(upstream.requested(), 0);

    let late = Arc::new(Upstream::default());
    arbiter.set(late.clone());
    assert_eq!(late.cancelled(), 1);
    assert_eq!(late.requested(), 0);
  }

  /// Counts events carrying the drain-iteration fields.
  struct DrainEvents(Arc<AtomicUsize>);

  impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for DrainEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _: tracing_subscriber::layer::Context<'_, S>) {
      let fields = event.metadata().fields();
      if fields.field("missed_requested").is_some() && fields.field("swapped").is_some() {
        self.0.fetch_add(1, Ordering::SeqCst);
      }
    }
  }

  #[rxdemand_macro::test]
  fn drain_iterations_are_traced() {
    use tracing_subscriber::layer::SubscriberExt;

    let iterations = Arc::new(AtomicUsize::new(0));
    let collector = tracing_subscriber::registry().with(DrainEvents(iterations.clone()));
    tracing::subscriber::with_default(collector, || {
      let arbiter = SubscriptionArbiter::new();
      arbiter.set(Arc::new(Upstream::default()));
      arbiter.request(3);
      assert_eq!(iterations.load(Ordering::SeqCst), 0);

      arbiter.cancel();
      assert_eq!(iterations.load(Ordering::SeqCst), 1);
    });
  }

  /// A handle that re-enters the arbiter from inside `request`, as a
  /// synchronous producer does when it emits on the requesting thread.
  struct Reentrant {
    arbiter: Arc<SubscriptionArbiter>,
    received: AtomicU64,
  }

  impl Subscription for Reentrant {
    fn request(&self, n: u64) {
      self.received.fetch_add(n, Ordering::SeqCst);
      self.arbiter.produced(n);
    }

    fn cancel(&self) {}
  }

  #[rxdemand_macro::test]
  fn reentrant_produced_does_not_deadlock() {
    let arbiter = Arc::new(SubscriptionArbiter::new());
    let upstream = Arc::new(Reentrant { arbiter: arbiter.clone(), received: AtomicU64::new(0) });
    arbiter.request(3);
    arbiter.set(upstream.clone());
    arbiter.request(2);

    assert_eq!(upstream.received.load(Ordering::SeqCst), 5);
    assert_eq!(arbiter.requested(), 0);
  }

  #[rxdemand_macro::test]
  fn concurrent_requests_are_not_lost() {
    const THREADS: usize = 8;
    const PER_THREAD: u64 = 1_000;

    let arbiter = Arc::new(SubscriptionArbiter::new());
    let upstream = Arc::new(Upstream::default());
    let barrier = Arc::new(Barrier::new(THREADS + 1));

    let handles: Vec<_> = (0..THREADS)
      .map(|_| {
        let arbiter = arbiter.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
          barrier.wait();
          for _ in 0..PER_THREAD {
            arbiter.request(1);
          }
        })
      })
      .collect();

    barrier.wait();
    arbiter.set(upstream.clone());
    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(arbiter.requested(), THREADS as u64 * PER_THREAD);
    assert_eq!(upstream.requested(), THREADS as u64 * PER_THREAD);
  }
}
