//! A recording subscriber for tests and examples
//!
//! [`TestSubscriber`] keeps every signal it receives, tracks the demand it
//! has requested, and counts protocol violations instead of panicking, so a
//! test can assert on them after the fact.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::{
  demand::{UNBOUNDED_DEMAND, add_cap},
  subscriber::Subscriber,
  subscription::BoxedSubscription,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
  /// Requests only what the test asks for.
  Manual,
  /// Requests one more item after each one it receives.
  OneByOne,
}

struct State<Item, Err> {
  values: Vec<Item>,
  errors: Vec<Err>,
  completions: usize,
  subscriptions: usize,
  /// Total demand requested so far, including requests not yet forwarded.
  requested: u64,
  /// Requested before a subscription arrived.
  pending: u64,
  received: u64,
  demand_violations: usize,
  late_signals: usize,
  cancelled: bool,
  subscription: Option<BoxedSubscription>,
}

impl<Item, Err> State<Item, Err> {
  fn is_terminated(&self) -> bool { self.completions + self.errors.len() > 0 }
}

pub struct TestSubscriber<Item, Err> {
  mode: Mode,
  state: Mutex<State<Item, Err>>,
  signalled: Condvar,
}

impl<Item, Err> TestSubscriber<Item, Err> {
  fn with(mode: Mode, initial: u64, cancelled: bool) -> Arc<Self> {
    Arc::new(Self {
      mode,
      state: Mutex::new(State {
        values: Vec::new(),
        errors: Vec::new(),
        completions: 0,
        subscriptions: 0,
        requested: initial,
        pending: initial,
        received: 0,
        demand_violations: 0,
        late_signals: 0,
        cancelled,
        subscription: None,
      }),
      signalled: Condvar::new(),
    })
  }

  /// Requests `initial` items as soon as it is subscribed; `0` requests
  /// nothing until [`request`](Self::request) is called.
  pub fn new(initial: u64) -> Arc<Self> { Self::with(Mode::Manual, initial, false) }

  pub fn unbounded() -> Arc<Self> { Self::new(UNBOUNDED_DEMAND) }

  /// Requests one item on subscription and one more from inside every
  /// `on_next`.
  pub fn one_by_one() -> Arc<Self> { Self::with(Mode::OneByOne, 1, false) }

  /// Cancels the subscription from inside `on_subscribe`.
  pub fn cancelled_on_subscribe() -> Arc<Self> { Self::with(Mode::Manual, 0, true) }

  /// Raises the demand by `n`. If no subscription has arrived yet, the
  /// demand is forwarded as soon as one does.
  pub fn request(&self, n: u64) {
    let subscription = {
      let mut state = self.state.lock();
      state.requested = add_cap(state.requested, n);
      match &state.subscription {
        Some(subscription) => subscription.clone(),
        None => {
          state.pending = add_cap(state.pending, n);
          return;
        }
      }
    };
    subscription.request(n);
  }

  pub fn cancel(&self) {
    let subscription = {
      let mut state = self.state.lock();
      state.cancelled = true;
      state.subscription.clone()
    };
    if let Some(subscription) = subscription {
      subscription.cancel();
    }
  }

  pub fn values(&self) -> Vec<Item>
  where
    Item: Clone,
  {
    self.state.lock().values.clone()
  }

  pub fn errors(&self) -> Vec<Err>
  where
    Err: Clone,
  {
    self.state.lock().errors.clone()
  }

  pub fn completions(&self) -> usize { self.state.lock().completions }

  pub fn is_terminated(&self) -> bool { self.state.lock().is_terminated() }

  /// Number of `on_subscribe` calls received.
  pub fn subscriptions(&self) -> usize { self.state.lock().subscriptions }

  /// Items received beyond the requested demand.
  pub fn demand_violations(&self) -> usize { self.state.lock().demand_violations }

  /// Signals received after a terminal signal.
  pub fn late_signals(&self) -> usize { self.state.lock().late_signals }

  /// Blocks until a terminal signal arrives or `timeout` elapses. Returns
  /// whether the subscriber is terminated.
  pub fn await_terminal(&self, timeout: Duration) -> bool {
    self.await_state(timeout, State::is_terminated)
  }

  /// Blocks until at least `count` items were received or `timeout` elapses.
  pub fn await_values(&self, count: usize, timeout: Duration) -> bool {
    self.await_state(timeout, |state| state.values.len() >= count)
  }

  fn await_state(&self, timeout: Duration, done: impl Fn(&State<Item, Err>) -> bool) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    let mut state = self.state.lock();
    while !done(&state) {
      match deadline {
        Some(deadline) => {
          if self.signalled.wait_until(&mut state, deadline).timed_out() {
            return done(&state);
          }
        }
        None => self.signalled.wait(&mut state),
      }
    }
    true
  }
}

impl<Item, Err> Subscriber<Item, Err> for TestSubscriber<Item, Err>
where
  Item: Send,
  Err: Send,
{
  fn on_subscribe(&self, subscription: BoxedSubscription) {
    let (cancelled, pending) = {
      let mut state = self.state.lock();
      state.subscriptions += 1;
      state.subscription = Some(subscription.clone());
      (state.cancelled, std::mem::take(&mut state.pending))
    };

    if cancelled {
      subscription.cancel();
    } else if pending > 0 {
      subscription.request(pending);
    }
  }

  fn on_next(&self, item: Item) {
    let more = {
      let mut state = self.state.lock();
      if state.is_terminated() {
        state.late_signals += 1;
      }
      if state.requested != UNBOUNDED_DEMAND && state.received >= state.requested {
        state.demand_violations += 1;
      }
      state.received += 1;
      state.values.push(item);
      self.signalled.notify_all();

      if self.mode == Mode::OneByOne && !state.cancelled {
        state.requested = add_cap(state.requested, 1);
        state.subscription.clone()
      } else {
        None
      }
    };

    if let Some(subscription) = more {
      subscription.request(1);
    }
  }

  fn on_error(&self, err: Err) {
    let mut state = self.state.lock();
    if state.is_terminated() {
      state.late_signals += 1;
    }
    state.errors.push(err);
    self.signalled.notify_all();
  }

  fn on_complete(&self) {
    let mut state = self.state.lock();
    if state.is_terminated() {
      state.late_signals += 1;
    }
    state.completions += 1;
    self.signalled.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU64, Ordering};

  use super::*;
  use crate::subscription::Subscription;

  #[derive(Default)]
  struct Ledger {
    requested: AtomicU64,
    cancels: AtomicU64,
  }

  impl Subscription for Ledger {
    fn request(&self, n: u64) { self.requested.fetch_add(n, Ordering::SeqCst); }

    fn cancel(&self) { self.cancels.fetch_add(1, Ordering::SeqCst); }
  }

  #[rxdemand_macro::test]
  fn pending_demand_is_forwarded_on_subscribe() {
    let subscriber = TestSubscriber::<i32, ()>::new(2);
    subscriber.request(3);
    let ledger = Arc::new(Ledger::default());
    subscriber.on_subscribe(ledger.clone());
    assert_eq!(ledger.requested.load(Ordering::SeqCst), 5);
  }

  #[rxdemand_macro::test]
  fn counts_over_delivery() {
    let subscriber = TestSubscriber::<i32, ()>::new(1);
    subscriber.on_subscribe(Arc::new(Ledger::default()));
    subscriber.on_next(1);
    subscriber.on_next(2);
    assert_eq!(subscriber.values(), vec![1, 2]);
    assert_eq!(subscriber.demand_violations(), 1);
  }

  #[rxdemand_macro::test]
  fn counts_signals_after_termination() {
    let subscriber = TestSubscriber::<i32, ()>::unbounded();
    subscriber.on_subscribe(Arc::new(Ledger::default()));
    subscriber.on_complete();
    subscriber.on_error(());
    assert_eq!(subscriber.late_signals(), 1);
  }

  #[rxdemand_macro::test]
  fn cancelled_on_subscribe_cancels_and_requests_nothing() {
    let subscriber = TestSubscriber::<i32, ()>::cancelled_on_subscribe();
    let ledger = Arc::new(Ledger::default());
    subscriber.on_subscribe(ledger.clone());
    assert_eq!(ledger.cancels.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.requested.load(Ordering::SeqCst), 0);
  }

  #[rxdemand_macro::test]
  fn unrepresentable_timeout_waits_for_the_signal() {
    let subscriber = TestSubscriber::<i32, ()>::unbounded();
    subscriber.on_subscribe(Arc::new(Ledger::default()));
    let signaller = {
      let subscriber = subscriber.clone();
      std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        subscriber.on_next(1);
        subscriber.on_complete();
      })
    };

    assert!(subscriber.await_values(1, Duration::MAX));
    assert!(subscriber.await_terminal(Duration::MAX));
    signaller.join().unwrap();
  }

  #[rxdemand_macro::test]
  fn await_terminal_times_out() {
    let subscriber = TestSubscriber::<i32, ()>::unbounded();
    assert!(!subscriber.await_terminal(Duration::from_millis(10)));
  }
}
