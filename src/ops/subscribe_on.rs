//! SubscribeOn operator
//!
//! Moves every `subscribe` call on the source to a [`Scheduler`]. Placed
//! under a resubscribing operator, it makes each attempt start on the
//! scheduler instead of inside the callback of the previous attempt.

use std::sync::Arc;

use crate::{publisher::Publisher, scheduler::Scheduler, subscriber::BoxedSubscriber};

pub struct SubscribeOn<S, Sch> {
  source: Arc<S>,
  scheduler: Sch,
}

impl<S, Sch> SubscribeOn<S, Sch> {
  pub fn new(source: S, scheduler: Sch) -> Self { Self { source: Arc::new(source), scheduler } }
}

impl<S, Sch: Clone> Clone for SubscribeOn<S, Sch> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), scheduler: self.scheduler.clone() } }
}

impl<S, Sch, Item, Err> Publisher<Item, Err> for SubscribeOn<S, Sch>
where
  S: Publisher<Item, Err> + 'static,
  Sch: Scheduler,
  Item: 'static,
  Err: 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<Item, Err>) {
    let source = self.source.clone();
    self
      .scheduler
      .schedule(Box::new(move || source.subscribe(subscriber)));
  }
}
