//! Publisher trait and the operator extension trait
//!
//! A [`Publisher`] is a re-obtainable source: every call to `subscribe` starts
//! a fresh, independent attempt that delivers data signals followed by exactly
//! one terminal signal, unless cancelled first.

use std::sync::Arc;

use crate::{
  error::ConfigError,
  ops::{
    into_stream::IntoStream,
    repeat_while::{RepeatWhile, TryWhileFn, WhileFn},
    retry::{Retry, RetryBound},
    subscribe_on::SubscribeOn,
  },
  scheduler::Scheduler,
  subscriber::BoxedSubscriber,
};

/// The producer side of the demand protocol.
pub trait Publisher<Item, Err>: Send + Sync {
  /// Starts a new attempt delivering to `subscriber`.
  ///
  /// The publisher calls `on_subscribe` on the subscriber before any other
  /// signal, and emits nothing until demand has been requested.
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>);
}

/// Shared, type-erased publisher handle.
pub type BoxedPublisher<Item, Err> = Arc<dyn Publisher<Item, Err>>;

impl<T, Item, Err> Publisher<Item, Err> for Arc<T>
where
  T: Publisher<Item, Err> + ?Sized,
{
  #[inline]
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) { (**self).subscribe(subscriber) }
}

/// Operators available on every [`Publisher`].
pub trait PublisherExt<Item, Err>: Publisher<Item, Err> + Sized {
  /// Resubscribes up to `times` times when the source signals an error.
  ///
  /// `times == 0` forwards the first error, `times == 2` makes at most three
  /// attempts. A negative bound is a configuration error; `i64::MAX` means
  /// unbounded.
  ///
  /// ```rust
  /// use rxdemand::prelude::*;
  ///
  /// let result = factory::throw_err::<i32, _>("boom").retry(-1);
  /// assert!(matches!(result, Err(ConfigError::NegativeRetryBound(-1))));
  /// ```
  fn retry(self, times: i64) -> Result<Retry<Self>, ConfigError> {
    Ok(Retry::new(self, RetryBound::new(times)?))
  }

  /// Resubscribes on every error, without limit.
  fn retry_unbounded(self) -> Retry<Self> { Retry::new(self, RetryBound::Unbounded) }

  /// Resubscribes according to an already validated bound.
  fn retry_with(self, bound: RetryBound) -> Retry<Self> { Retry::new(self, bound) }

  /// Resubscribes after each completion for as long as `predicate` returns
  /// `true`. The predicate is evaluated once per completion.
  fn repeat_while<F>(self, predicate: F) -> RepeatWhile<Self, WhileFn<F>>
  where
    F: FnMut() -> bool + Send,
  {
    RepeatWhile::new(self, WhileFn(predicate))
  }

  /// Like [`repeat_while`](Self::repeat_while) with a fallible predicate. An
  /// `Err` from the predicate is delivered as the terminal error in place of
  /// the completion that triggered the evaluation.
  fn try_repeat_while<F>(self, predicate: F) -> RepeatWhile<Self, TryWhileFn<F>>
  where
    F: FnMut() -> Result<bool, Err> + Send,
  {
    RepeatWhile::new(self, TryWhileFn(predicate))
  }

  /// Performs every `subscribe` call, i.e. every attempt, on `scheduler`.
  fn subscribe_on<Sch: Scheduler>(self, scheduler: Sch) -> SubscribeOn<Self, Sch> {
    SubscribeOn::new(self, scheduler)
  }

  /// Adapts the publisher into a `futures::Stream`, keeping at most
  /// `prefetch` items requested ahead of the consumer.
  fn into_stream(self, prefetch: usize) -> IntoStream<Item, Err>
  where
    Item: Send + 'static,
    Err: Send + 'static,
  {
    IntoStream::new(&self, prefetch)
  }
}

impl<T, Item, Err> PublisherExt<Item, Err> for T where T: Publisher<Item, Err> {}
