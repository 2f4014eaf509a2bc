use std::{
  iter::Peekable,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use parking_lot::Mutex;

use crate::{
  demand::{Demand, validate},
  publisher::Publisher,
  subscriber::BoxedSubscriber,
  subscription::{EmptySubscription, Subscription},
};

/// Creates a publisher that emits the items of `iter` as demand allows, then
/// completes.
///
/// The iterable is cloned for every subscription, so each attempt replays it
/// from the start.
///
/// ```rust
/// use rxdemand::prelude::*;
///
/// let subscriber = TestSubscriber::new(2);
/// factory::from_iter::<_, ()>(1..=5).subscribe(subscriber.clone());
/// assert_eq!(subscriber.values(), vec![1, 2]);
///
/// subscriber.request(3);
/// assert_eq!(subscriber.values(), vec![1, 2, 3, 4, 5]);
/// assert_eq!(subscriber.completions(), 1);
/// ```
pub fn from_iter<I, Err>(iter: I) -> FromIter<I, Err>
where
  I: IntoIterator + Clone,
{
  FromIter { iter, error: None }
}

/// Like [`from_iter`], but terminates with `err` after the last item instead
/// of completing.
pub fn from_iter_then_error<I, Err>(iter: I, err: Err) -> FromIter<I, Err>
where
  I: IntoIterator + Clone,
  Err: Clone,
{
  FromIter { iter, error: Some(err) }
}

#[derive(Clone)]
pub struct FromIter<I, Err> {
  iter: I,
  error: Option<Err>,
}

impl<I, Err> Publisher<I::Item, Err> for FromIter<I, Err>
where
  I: IntoIterator + Clone + Send + Sync,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<I::Item, Err>) {
    let mut iter = self.iter.clone().into_iter().peekable();

    // Nothing to emit: terminate without waiting for demand.
    if iter.peek().is_none() {
      subscriber.on_subscribe(EmptySubscription::boxed());
      match self.error.clone() {
        Some(err) => subscriber.on_error(err),
        None => subscriber.on_complete(),
      }
      return;
    }

    let subscription = Arc::new(IterSubscription {
      state: Mutex::new(Some(IterState {
        iter,
        error: self.error.clone(),
        actual: subscriber.clone(),
      })),
      demand: Demand::new(),
      done: AtomicBool::new(false),
    });
    subscriber.on_subscribe(subscription);
  }
}

struct IterState<It: Iterator, Err> {
  iter: Peekable<It>,
  error: Option<Err>,
  actual: BoxedSubscriber<It::Item, Err>,
}

/// The subscription handed out by [`FromIter`].
///
/// Emission runs on whichever thread raised the demand from zero; the lock
/// around the iterator is never held while the subscriber is called.
pub struct IterSubscription<It: Iterator, Err> {
  /// `None` once terminated or cancelled.
  state: Mutex<Option<IterState<It, Err>>>,
  demand: Demand,
  done: AtomicBool,
}

impl<It, Err> IterSubscription<It, Err>
where
  It: Iterator,
{
  fn drain(&self) {
    let mut emitted = 0;
    loop {
      let requested = self.demand.get();
      while emitted != requested {
        if self.done.load(Ordering::Acquire) {
          return;
        }

        let next = {
          let mut guard = self.state.lock();
          let Some(state) = guard.as_mut() else {
            return;
          };
          state.iter.next().map(|item| (item, state.actual.clone()))
        };
        let Some((item, actual)) = next else {
          self.finish();
          return;
        };

        actual.on_next(item);
        emitted += 1;

        if self.is_exhausted() {
          self.finish();
          return;
        }
      }

      let remaining = self.demand.produced(emitted);
      if remaining == 0 {
        return;
      }
      emitted = 0;
    }
  }

  fn is_exhausted(&self) -> bool {
    match self.state.lock().as_mut() {
      Some(state) => state.iter.peek().is_none(),
      None => false,
    }
  }

  fn finish(&self) {
    let Some(state) = self.state.lock().take() else {
      return;
    };
    self.done.store(true, Ordering::Release);
    match state.error {
      Some(err) => state.actual.on_error(err),
      None => state.actual.on_complete(),
    }
  }
}

impl<It, Err> Subscription for IterSubscription<It, Err>
where
  It: Iterator + Send,
  It::Item: Send,
  Err: Send,
{
  fn request(&self, n: u64) {
    if !validate(n) || self.done.load(Ordering::Acquire) {
      return;
    }
    if self.demand.add(n) == 0 {
      self.drain();
    }
  }

  fn cancel(&self) {
    self.done.store(true, Ordering::Release);
    // Dropping the state releases the subscriber, which usually holds this
    // subscription in turn.
    let state = self.state.lock().take();
    drop(state);
  }
}
