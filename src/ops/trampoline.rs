//! Resubscription driver shared by the resubscribing operators.
//!
//! A source that completes (or errors) synchronously inside `subscribe` would
//! otherwise call back into the operator, which would subscribe again from
//! inside that callback, and so on: one stack frame per attempt. The driver
//! turns those nested requests into iterations of a single loop.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::subscription::SubscriptionArbiter;

#[derive(Debug, Default)]
pub struct ResubscribeDriver {
  wip: AtomicUsize,
  /// Items delivered by the current attempt since the last swap.
  produced: AtomicU64,
}

impl ResubscribeDriver {
  pub fn new() -> Self { Self::default() }

  /// Counts one item delivered by the active attempt.
  #[inline]
  pub fn record_produced(&self) { self.produced.fetch_add(1, Ordering::AcqRel); }

  /// Requests a new attempt.
  ///
  /// The caller that finds no loop running becomes the driver: it flushes the
  /// delivered items into the ledger, calls `subscribe`, and repeats for as
  /// long as further attempts were requested while it was busy. Any other
  /// caller only registers its request and returns. The loop stops for good
  /// as soon as the arbiter is cancelled.
  pub fn resubscribe(&self, arbiter: &SubscriptionArbiter, mut subscribe: impl FnMut()) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }

    loop {
      if arbiter.is_cancelled() {
        return;
      }

      let produced = self.produced.swap(0, Ordering::AcqRel);
      if produced != 0 {
        arbiter.produced(produced);
      }

      subscribe();

      if self.wip.fetch_sub(1, Ordering::AcqRel) == 1 {
        return;
      }
    }
  }
}
