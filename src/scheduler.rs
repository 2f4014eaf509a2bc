//! Schedulers
//!
//! A [`Scheduler`] decides where a unit of work runs. The resubscribing
//! operators never schedule anything themselves; [`subscribe_on`] uses a
//! scheduler to move every attempt off the caller's thread.
//!
//! | Scheduler | Runs tasks | Feature |
//! |-----------|-----------|---------|
//! | [`ImmediateScheduler`] | on the calling thread, before `schedule` returns | always |
//! | `futures::executor::ThreadPool` | on a pool worker | `futures-scheduler` |
//! | `tokio::runtime::Handle` | on the runtime's blocking pool | `tokio-scheduler` |
//!
//! [`subscribe_on`]: crate::publisher::PublisherExt::subscribe_on

/// A unit of work handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run tasks, possibly on another thread.
pub trait Scheduler: Clone + Send + Sync + 'static {
  fn schedule(&self, task: Task);
}

/// Runs every task synchronously inside `schedule`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  #[inline]
  fn schedule(&self, task: Task) { task() }
}

#[cfg(feature = "futures-scheduler")]
mod thread_pool {
  use std::io;

  use futures::executor::ThreadPool;
  use once_cell::sync::OnceCell;

  use super::{Scheduler, Task};

  static DEFAULT_POOL: OnceCell<ThreadPool> = OnceCell::new();

  /// A process-wide thread pool, created on first use.
  pub fn default_thread_pool() -> io::Result<ThreadPool> {
    DEFAULT_POOL.get_or_try_init(ThreadPool::new).cloned()
  }

  impl Scheduler for ThreadPool {
    fn schedule(&self, task: Task) { self.spawn_ok(futures::future::lazy(move |_| task())); }
  }
}

#[cfg(feature = "futures-scheduler")]
pub use thread_pool::default_thread_pool;

#[cfg(feature = "tokio-scheduler")]
impl Scheduler for tokio::runtime::Handle {
  fn schedule(&self, task: Task) {
    // Sources are synchronous and may block.
    drop(self.spawn_blocking(task));
  }
}
