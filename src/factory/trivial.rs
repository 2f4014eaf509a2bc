use std::marker::PhantomData;

use crate::{publisher::Publisher, subscriber::BoxedSubscriber, subscription::EmptySubscription};

/// Creates a publisher that completes as soon as it is subscribed.
pub fn empty<Item, Err>() -> Empty<Item, Err> { Empty(PhantomData) }

/// Creates a publisher that errors with `err` as soon as it is subscribed.
pub fn throw_err<Item, Err>(err: Err) -> ThrowErr<Item, Err> { ThrowErr { err, _item: PhantomData } }

/// Creates a publisher that never emits nor terminates.
pub fn never<Item, Err>() -> Never<Item, Err> { Never(PhantomData) }

#[derive(Clone, Copy)]
pub struct Empty<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Publisher<Item, Err> for Empty<Item, Err> {
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    subscriber.on_subscribe(EmptySubscription::boxed());
    subscriber.on_complete();
  }
}

#[derive(Clone)]
pub struct ThrowErr<Item, Err> {
  err: Err,
  _item: PhantomData<fn() -> Item>,
}

impl<Item, Err> Publisher<Item, Err> for ThrowErr<Item, Err>
where
  Err: Clone + Send + Sync,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    subscriber.on_subscribe(EmptySubscription::boxed());
    subscriber.on_error(self.err.clone());
  }
}

#[derive(Clone, Copy)]
pub struct Never<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Publisher<Item, Err> for Never<Item, Err> {
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    subscriber.on_subscribe(EmptySubscription::boxed());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_subscriber::TestSubscriber;

  #[rxdemand_macro::test]
  fn empty_completes_without_demand() {
    let subscriber = TestSubscriber::<i32, ()>::new(0);
    empty::<i32, ()>().subscribe(subscriber.clone());
    assert_eq!(subscriber.completions(), 1);
    assert!(subscriber.values().is_empty());
  }

  #[rxdemand_macro::test]
  fn throw_err_errors_every_subscription() {
    let source = throw_err::<i32, _>("oops");
    let first = TestSubscriber::unbounded();
    let second = TestSubscriber::unbounded();
    source.subscribe(first.clone());
    source.subscribe(second.clone());
    assert_eq!(first.errors(), vec!["oops"]);
    assert_eq!(second.errors(), vec!["oops"]);
  }

  #[rxdemand_macro::test]
  fn never_stays_silent() {
    let subscriber = TestSubscriber::<i32, ()>::unbounded();
    never::<i32, ()>().subscribe(subscriber.clone());
    assert_eq!(subscriber.subscriptions(), 1);
    assert!(!subscriber.is_terminated());
  }
}
