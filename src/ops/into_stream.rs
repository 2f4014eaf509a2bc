//! IntoStream Operator
//!
//! Converts a [`Publisher`] into a `futures::Stream` of `Result<Item, Err>`,
//! with bounded demand: at most `prefetch` items are requested ahead of the
//! consumer, and one more is requested each time an item is polled.
//!
//! # Example
//!
//! ```rust
//! use futures::{StreamExt, executor::block_on};
//! use rxdemand::prelude::*;
//!
//! let items: Vec<_> = block_on(
//!   factory::from_iter::<_, ()>(1..=4)
//!     .into_stream(2)
//!     .collect(),
//! );
//! assert_eq!(items, vec![Ok(1), Ok(2), Ok(3), Ok(4)]);
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll, Waker},
};

use futures::Stream;
use parking_lot::Mutex;

use crate::{
  publisher::Publisher,
  subscriber::Subscriber,
  subscription::{BoxedSubscription, Subscription},
};

/// State shared between the subscriber half and the stream consumer.
struct IntoStreamState<Item, Err> {
  /// Items and errors waiting to be polled.
  queue: VecDeque<Result<Item, Err>>,
  waker: Option<Waker>,
  /// The source has terminated.
  closed: bool,
  /// The stream was dropped.
  cancelled: bool,
  subscription: Option<BoxedSubscription>,
}

type SharedState<Item, Err> = Arc<Mutex<IntoStreamState<Item, Err>>>;

/// A `Stream` that yields the signals of a publisher.
///
/// - `Ok(item)` for each item;
/// - `Err(err)` once, if the publisher errors;
/// - `None` after completion or after the error.
///
/// Dropping the stream cancels the subscription.
pub struct IntoStream<Item, Err> {
  state: SharedState<Item, Err>,
}

impl<Item, Err> IntoStream<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  /// Subscribes to `publisher`. A `prefetch` of zero is treated as one.
  pub fn new<P>(publisher: &P, prefetch: usize) -> Self
  where
    P: Publisher<Item, Err> + ?Sized,
  {
    let state = Arc::new(Mutex::new(IntoStreamState {
      queue: VecDeque::new(),
      waker: None,
      closed: false,
      cancelled: false,
      subscription: None,
    }));
    let prefetch = prefetch.max(1) as u64;
    publisher.subscribe(Arc::new(IntoStreamSubscriber { state: state.clone(), prefetch }));
    IntoStream { state }
  }
}

impl<Item, Err> Stream for IntoStream<Item, Err> {
  type Item = Result<Item, Err>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let mut state = self.state.lock();

    match state.queue.pop_front() {
      Some(Ok(item)) => {
        let replenish = state.subscription.clone();
        drop(state);
        if let Some(subscription) = replenish {
          subscription.request(1);
        }
        Poll::Ready(Some(Ok(item)))
      }
      Some(Err(err)) => Poll::Ready(Some(Err(err))),
      None if state.closed => Poll::Ready(None),
      None => {
        match &state.waker {
          Some(waker) if waker.will_wake(cx.waker()) => {}
          _ => state.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
      }
    }
  }
}

impl<Item, Err> Drop for IntoStream<Item, Err> {
  fn drop(&mut self) {
    let subscription = {
      let mut state = self.state.lock();
      state.cancelled = true;
      state.queue.clear();
      state.subscription.take()
    };
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
  }
}

struct IntoStreamSubscriber<Item, Err> {
  state: SharedState<Item, Err>,
  prefetch: u64,
}

impl<Item, Err> IntoStreamSubscriber<Item, Err> {
  fn push(&self, signal: Option<Result<Item, Err>>) {
    let waker = {
      let mut state = self.state.lock();
      if state.closed || state.cancelled {
        return;
      }
      match signal {
        Some(Ok(item)) => state.queue.push_back(Ok(item)),
        Some(Err(err)) => {
          state.queue.push_back(Err(err));
          state.closed = true;
        }
        None => state.closed = true,
      }
      if state.closed {
        // Release the upstream handle; nothing more will be requested.
        state.subscription = None;
      }
      state.waker.take()
    };
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<Item, Err> Subscriber<Item, Err> for IntoStreamSubscriber<Item, Err>
where
  Item: Send,
  Err: Send,
{
  fn on_subscribe(&self, subscription: BoxedSubscription) {
    let cancelled = {
      let mut state = self.state.lock();
      if !state.cancelled {
        state.subscription = Some(subscription.clone());
      }
      state.cancelled
    };
    if cancelled {
      subscription.cancel();
    } else {
      subscription.request(self.prefetch);
    }
  }

  fn on_next(&self, item: Item) { self.push(Some(Ok(item))); }

  fn on_error(&self, err: Err) { self.push(Some(Err(err))); }

  fn on_complete(&self) { self.push(None); }
}
