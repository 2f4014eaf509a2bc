//! Source factories
//!
//! Every publisher built here is re-obtainable: each `subscribe` starts a
//! fresh attempt from the beginning, which is what the resubscribing
//! operators rely on.
//!
//! | Factory | Emits |
//! |---------|-------|
//! | [`from_iter`] | the iterator's items, then completes |
//! | [`from_iter_then_error`] | the iterator's items, then errors |
//! | [`empty`] | completes inside `subscribe` |
//! | [`throw_err`] | errors inside `subscribe` |
//! | [`never`] | nothing, ever |
//! | [`defer`] | whatever a freshly built publisher emits |

mod defer;
mod from_iter;
mod trivial;

pub use defer::{Defer, defer};
pub use from_iter::{FromIter, IterSubscription, from_iter, from_iter_then_error};
pub use trivial::{Empty, Never, ThrowErr, empty, never, throw_err};
