//! Integration tests for the retry operator.

mod common;

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use common::{init_tracing, scripted};
use parking_lot::Mutex;
use rxdemand::prelude::*;

#[rxdemand_macro::test]
fn always_failing_source_gets_bound_plus_one_attempts() {
  init_tracing();
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let source = factory::defer(move || {
    counter.fetch_add(1, Ordering::SeqCst);
    factory::throw_err::<i32, _>("unreachable peer")
  });

  let subscriber = TestSubscriber::unbounded();
  source.retry(2).unwrap().subscribe(subscriber.clone());

  assert_eq!(attempts.load(Ordering::SeqCst), 3);
  assert_eq!(subscriber.errors(), vec!["unreachable peer"]);
  assert_eq!(subscriber.completions(), 0);
  assert_eq!(subscriber.late_signals(), 0);
}

#[rxdemand_macro::test]
fn items_from_failed_attempts_reach_the_subscriber() {
  init_tracing();
  let (source, attempts) = scripted(vec![vec![1], vec![2, 3], vec![4]]);
  let subscriber = TestSubscriber::unbounded();
  source.retry_unbounded().subscribe(subscriber.clone());

  assert_eq!(attempts.load(Ordering::SeqCst), 3);
  assert_eq!(subscriber.values(), vec![1, 2, 3, 4]);
  assert_eq!(subscriber.completions(), 1);
}

#[rxdemand_macro::test]
fn outstanding_demand_moves_to_the_next_attempt() {
  init_tracing();
  let (source, attempts) = scripted(vec![vec![1, 2], vec![10, 20, 30, 40]]);
  let subscriber = TestSubscriber::new(3);
  source.retry(1).unwrap().subscribe(subscriber.clone());

  assert_eq!(attempts.load(Ordering::SeqCst), 2);
  assert_eq!(subscriber.values(), vec![1, 2, 10]);

  subscriber.request(2);
  assert_eq!(subscriber.values(), vec![1, 2, 10, 20, 30]);
  assert_eq!(subscriber.completions(), 0);

  subscriber.request(1);
  assert_eq!(subscriber.values(), vec![1, 2, 10, 20, 30, 40]);
  assert_eq!(subscriber.completions(), 1);
  assert_eq!(subscriber.demand_violations(), 0);
}

#[rxdemand_macro::test]
fn zero_outstanding_demand_waits_for_a_request() {
  init_tracing();
  // The failed attempt consumes the whole demand.
  let (source, attempts) = scripted(vec![vec![1, 2], vec![3]]);
  let subscriber = TestSubscriber::new(2);
  source.retry(1).unwrap().subscribe(subscriber.clone());

  assert_eq!(attempts.load(Ordering::SeqCst), 2);
  assert_eq!(subscriber.values(), vec![1, 2]);
  assert!(!subscriber.is_terminated());

  subscriber.request(1);
  assert_eq!(subscriber.values(), vec![1, 2, 3]);
  assert_eq!(subscriber.completions(), 1);
}

#[rxdemand_macro::test]
fn cancel_from_on_next_stops_further_attempts() {
  init_tracing();
  let (source, attempts) = scripted(vec![vec![1, 2, 3], vec![4]]);
  let guard: Arc<Mutex<Option<SubscriptionGuard>>> = Arc::default();

  struct CancelAfterTwo {
    seen: Mutex<Vec<i32>>,
    guard: Arc<Mutex<Option<SubscriptionGuard>>>,
  }

  impl Subscriber<i32, String> for CancelAfterTwo {
    fn on_subscribe(&self, subscription: BoxedSubscription) {
      subscription.request(UNBOUNDED_DEMAND);
      *self.guard.lock() = Some(SubscriptionGuard::new(subscription));
    }

    fn on_next(&self, item: i32) {
      let mut seen = self.seen.lock();
      seen.push(item);
      if seen.len() == 2 {
        drop(seen);
        let guard = self.guard.lock().take();
        drop(guard);
      }
    }

    fn on_error(&self, _err: String) { panic!("cancelled sequence must stay silent") }

    fn on_complete(&self) { panic!("cancelled sequence must stay silent") }
  }

  let subscriber = Arc::new(CancelAfterTwo { seen: Mutex::default(), guard: guard.clone() });
  source.retry(5).unwrap().subscribe(subscriber.clone());

  assert_eq!(*subscriber.seen.lock(), vec![1, 2]);
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[rxdemand_macro::test]
fn retry_with_a_validated_bound() {
  init_tracing();
  let bound = RetryBound::try_from(1i64).unwrap();
  let (source, attempts) = scripted(vec![vec![], vec![], vec![9]]);
  let subscriber = TestSubscriber::<i32, String>::unbounded();
  let retry = source.retry_with(bound);
  assert_eq!(retry.bound(), RetryBound::Times(1));
  retry.subscribe(subscriber.clone());

  assert_eq!(attempts.load(Ordering::SeqCst), 2);
  assert_eq!(subscriber.errors(), vec!["attempt 1 failed".to_owned()]);
}

#[rxdemand_macro::test]
fn every_downstream_subscription_gets_its_own_budget() {
  init_tracing();
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let retry = factory::defer(move || {
    counter.fetch_add(1, Ordering::SeqCst);
    factory::throw_err::<i32, _>(())
  })
  .retry(1)
  .unwrap();

  for _ in 0..3 {
    let subscriber = TestSubscriber::unbounded();
    retry.clone().subscribe(subscriber.clone());
    assert_eq!(subscriber.errors(), vec![()]);
  }
  assert_eq!(attempts.load(Ordering::SeqCst), 6);
}

#[rxdemand_macro::test]
fn fn_subscriber_receives_every_item() {
  init_tracing();
  let (source, _) = scripted(vec![vec![1, 2], vec![3]]);
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  source
    .retry(1)
    .unwrap()
    .subscribe(FnSubscriber::<_, String>::new(move |v: i32| sink.lock().push(v)));

  assert_eq!(*seen.lock(), vec![1, 2, 3]);
}
