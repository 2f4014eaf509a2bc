#![allow(dead_code)]

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use rxdemand::prelude::*;

/// Installs a `tracing` subscriber that writes through the test harness.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// A source whose attempt `i` emits `attempts[i]` and then errors, except
/// for the last attempt which completes. Attempts past the end replay the
/// last one.
pub fn scripted(attempts: Vec<Vec<i32>>) -> (impl Publisher<i32, String> + Clone + 'static, Arc<AtomicUsize>) {
  let counter = Arc::new(AtomicUsize::new(0));
  let calls = counter.clone();
  let script = Arc::new(attempts);
  let source = Arc::new(factory::defer(move || -> BoxedPublisher<i32, String> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    let last = script.len() - 1;
    let items = script[n.min(last)].clone();
    if n < last {
      Arc::new(factory::from_iter_then_error(items, format!("attempt {n} failed")))
    } else {
      Arc::new(factory::from_iter::<_, String>(items))
    }
  }));
  (source, counter)
}
