use parking_lot::Mutex;

use crate::{publisher::Publisher, subscriber::BoxedSubscriber};

/// Creates a publisher that calls `factory` on every subscription and
/// subscribes the fresh publisher it returns.
///
/// ```rust
/// use rxdemand::prelude::*;
///
/// let mut attempt = 0;
/// let source = factory::defer(move || {
///   attempt += 1;
///   factory::from_iter::<_, ()>(vec![attempt])
/// });
///
/// let first = TestSubscriber::unbounded();
/// let second = TestSubscriber::unbounded();
/// source.subscribe(first.clone());
/// source.subscribe(second.clone());
/// assert_eq!(first.values(), vec![1]);
/// assert_eq!(second.values(), vec![2]);
/// ```
pub fn defer<F, P>(factory: F) -> Defer<F>
where
  F: FnMut() -> P + Send,
{
  Defer { factory: Mutex::new(factory) }
}

pub struct Defer<F> {
  factory: Mutex<F>,
}

impl<F, P, Item, Err> Publisher<Item, Err> for Defer<F>
where
  F: FnMut() -> P + Send,
  P: Publisher<Item, Err>,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    // The factory must not be locked while the new publisher runs: a
    // synchronous source may resubscribe through this same `Defer`.
    let publisher = {
      let mut factory = self.factory.lock();
      (*factory)()
    };
    publisher.subscribe(subscriber);
  }
}
