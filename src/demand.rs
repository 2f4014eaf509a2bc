//! Demand accounting
//!
//! Demand is a 64-bit counter of "requested but not yet delivered" items.
//! Additions saturate at [`UNBOUNDED_DEMAND`]; once a counter reaches that
//! value it is considered unbounded and is no longer decremented.

use std::sync::atomic::{AtomicU64, Ordering};

/// Demand value meaning "emit as much as you like".
pub const UNBOUNDED_DEMAND: u64 = u64::MAX;

/// Saturating addition of two demand amounts.
#[inline]
pub fn add_cap(a: u64, b: u64) -> u64 { a.saturating_add(b) }

/// Atomically adds `n` to `field` (saturating) and returns the previous value.
///
/// An unbounded field is left untouched.
pub fn get_and_add_cap(field: &AtomicU64, n: u64) -> u64 {
  field
    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
      if current == UNBOUNDED_DEMAND { None } else { Some(add_cap(current, n)) }
    })
    .unwrap_or_else(|current| current)
}

/// Checks the `request(n)` argument. `n == 0` is a protocol violation that is
/// logged and otherwise ignored.
#[inline]
pub(crate) fn validate(n: u64) -> bool {
  if n == 0 {
    tracing::warn!("request(0) violates the demand protocol, ignoring it");
    false
  } else {
    true
  }
}

/// Subtracts `produced` from `requested`, clamping at zero.
///
/// Producing more than was requested is a protocol violation on the
/// producer's side; it is logged and the ledger is clamped instead of
/// wrapping around.
#[inline]
pub(crate) fn sub_produced(requested: u64, produced: u64) -> u64 {
  match requested.checked_sub(produced) {
    Some(remaining) => remaining,
    None => {
      tracing::warn!(requested, produced, "more items produced than requested");
      0
    }
  }
}

/// A thread-safe ledger of outstanding demand, as kept by a producer.
#[derive(Debug, Default)]
pub struct Demand(AtomicU64);

impl Demand {
  pub fn new() -> Self { Self::default() }

  /// The demand currently outstanding.
  #[inline]
  pub fn get(&self) -> u64 { self.0.load(Ordering::Acquire) }

  #[inline]
  pub fn is_unbounded(&self) -> bool { self.get() == UNBOUNDED_DEMAND }

  /// Adds `n` and returns the demand outstanding before the addition.
  ///
  /// A return value of zero tells the caller that no emission loop is
  /// currently running and that it should start one.
  #[inline]
  pub fn add(&self, n: u64) -> u64 { get_and_add_cap(&self.0, n) }

  /// Records `n` delivered items and returns the remaining demand.
  pub fn produced(&self, n: u64) -> u64 {
    match self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
      if current == UNBOUNDED_DEMAND { None } else { Some(sub_produced(current, n)) }
    }) {
      Ok(previous) => sub_produced(previous, n),
      Err(unbounded) => unbounded,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxdemand_macro::test]
  fn add_saturates_at_unbounded() {
    let demand = Demand::new();
    assert_eq!(demand.add(5), 0);
    assert_eq!(demand.add(u64::MAX - 1), 5);
    assert!(demand.is_unbounded());
    assert_eq!(demand.add(10), UNBOUNDED_DEMAND);
    assert!(demand.is_unbounded());
  }

  #[rxdemand_macro::test]
  fn produced_never_goes_negative() {
    let demand = Demand::new();
    demand.add(3);
    assert_eq!(demand.produced(2), 1);
    assert_eq!(demand.produced(4), 0);
    assert_eq!(demand.get(), 0);
  }

  #[rxdemand_macro::test]
  fn unbounded_demand_is_not_decremented() {
    let demand = Demand::new();
    demand.add(UNBOUNDED_DEMAND);
    assert_eq!(demand.produced(1_000), UNBOUNDED_DEMAND);
  }

  #[rxdemand_macro::test]
  fn zero_request_is_rejected() {
    assert!(!validate(0));
    assert!(validate(1));
  }
}
