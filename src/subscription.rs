//! Subscription trait and implementations
//!
//! A subscription is the per-attempt handle through which a subscriber
//! signals demand and cancellation to its producer.

use std::sync::Arc;

mod arbiter;
mod dynamic;

pub use arbiter::SubscriptionArbiter;
pub use dynamic::DynamicSubscriptions;

/// Handle returned to a subscriber through `on_subscribe`.
///
/// - `request(n)` raises the demand by `n` (saturating). `n` must be positive.
/// - `cancel()` permanently stops emission. It is idempotent, and a
///   `request` after `cancel` is a no-op.
pub trait Subscription: Send + Sync {
  fn request(&self, n: u64);

  fn cancel(&self);
}

/// Shared, type-erased subscription handle.
pub type BoxedSubscription = Arc<dyn Subscription>;

impl<T> Subscription for Arc<T>
where
  T: Subscription + ?Sized,
{
  #[inline]
  fn request(&self, n: u64) { (**self).request(n) }

  #[inline]
  fn cancel(&self) { (**self).cancel() }
}

/// A subscription with nothing behind it.
///
/// Handed out by producers that terminate inside `subscribe` (or never emit at
/// all), and to subscribers that arrive after their resource was shut down.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySubscription;

impl EmptySubscription {
  pub fn boxed() -> BoxedSubscription { Arc::new(EmptySubscription) }
}

impl Subscription for EmptySubscription {
  #[inline]
  fn request(&self, _n: u64) {}

  #[inline]
  fn cancel(&self) {}
}

/// An RAII guard that cancels the wrapped subscription when dropped.
///
/// If you don't bind the guard to a variable, the subscription is cancelled
/// immediately.
#[must_use]
pub struct SubscriptionGuard(BoxedSubscription);

impl SubscriptionGuard {
  pub fn new(subscription: BoxedSubscription) -> Self { Self(subscription) }

  /// The guarded subscription, e.g. to request more demand.
  pub fn subscription(&self) -> &BoxedSubscription { &self.0 }
}

impl Drop for SubscriptionGuard {
  #[inline]
  fn drop(&mut self) { self.0.cancel() }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[derive(Default)]
  struct CountCancel(AtomicUsize);

  impl Subscription for CountCancel {
    fn request(&self, _n: u64) {}

    fn cancel(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
  }

  #[rxdemand_macro::test]
  fn guard_cancels_on_drop() {
    let inner = Arc::new(CountCancel::default());
    {
      let _guard = SubscriptionGuard::new(inner.clone());
      assert_eq!(inner.0.load(Ordering::SeqCst), 0);
    }
    assert_eq!(inner.0.load(Ordering::SeqCst), 1);
  }

  #[rxdemand_macro::test]
  fn empty_subscription_ignores_everything() {
    let empty = EmptySubscription::boxed();
    empty.request(10);
    empty.cancel();
    empty.cancel();
  }
}
