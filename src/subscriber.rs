//! Subscriber trait and implementations
//!
//! A Subscriber is the consumer side of the demand protocol. It receives a
//! [`Subscription`] first, and may then receive up to the requested number of
//! `on_next` signals followed by at most one terminal signal.

use std::{marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{
  demand::UNBOUNDED_DEMAND,
  subscription::{BoxedSubscription, Subscription},
};

// ============================================================================
// Subscriber Trait
// ============================================================================

/// The consumer of a demand-driven sequence.
///
/// All methods take `&self`: producer signals and consumer-side calls to the
/// subscription may arrive from different threads, so implementations keep
/// their state behind atomics or short-lived locks.
///
/// Protocol, as seen by an implementation:
/// - `on_subscribe` is called exactly once, before anything else.
/// - `on_next` is never called more often than the demand that was requested
///   through the subscription.
/// - `on_error` and `on_complete` are mutually exclusive and called at most
///   once; no signal follows them.
pub trait Subscriber<Item, Err>: Send + Sync {
  fn on_subscribe(&self, subscription: BoxedSubscription);

  fn on_next(&self, item: Item);

  fn on_error(&self, err: Err);

  fn on_complete(&self);
}

/// Shared, type-erased subscriber handle.
pub type BoxedSubscriber<Item, Err> = Arc<dyn Subscriber<Item, Err>>;

impl<T, Item, Err> Subscriber<Item, Err> for Arc<T>
where
  T: Subscriber<Item, Err> + ?Sized,
{
  #[inline]
  fn on_subscribe(&self, subscription: BoxedSubscription) { (**self).on_subscribe(subscription) }

  #[inline]
  fn on_next(&self, item: Item) { (**self).on_next(item) }

  #[inline]
  fn on_error(&self, err: Err) { (**self).on_error(err) }

  #[inline]
  fn on_complete(&self) { (**self).on_complete() }
}

// ============================================================================
// FnSubscriber - Closure adapter
// ============================================================================

/// Subscriber built from a `next` closure.
///
/// It requests unbounded demand as soon as it is subscribed, and ignores
/// errors and completion. Use [`TestSubscriber`] when bounded demand or the
/// terminal signal matters.
///
/// [`TestSubscriber`]: crate::test_subscriber::TestSubscriber
pub struct FnSubscriber<F, Err> {
  next: Mutex<F>,
  _err: PhantomData<fn(Err)>,
}

impl<F, Err> FnSubscriber<F, Err> {
  pub fn new(next: F) -> Arc<Self> { Arc::new(Self { next: Mutex::new(next), _err: PhantomData }) }
}

impl<F, Item, Err> Subscriber<Item, Err> for FnSubscriber<F, Err>
where
  F: FnMut(Item) + Send,
{
  fn on_subscribe(&self, subscription: BoxedSubscription) { subscription.request(UNBOUNDED_DEMAND); }

  fn on_next(&self, item: Item) {
    let mut next = self.next.lock();
    (&mut *next)(item);
  }

  fn on_error(&self, _err: Err) {}

  fn on_complete(&self) {}
}

// ============================================================================
// Tests
// ============================================================================
