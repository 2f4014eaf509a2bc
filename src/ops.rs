pub mod into_stream;
pub mod repeat_while;
pub mod retry;
pub mod subscribe_on;
pub mod trampoline;

pub use into_stream::IntoStream;
pub use repeat_while::{RepeatPredicate, RepeatWhile, TryWhileFn, WhileFn};
pub use retry::{Retry, RetryBound};
pub use subscribe_on::SubscribeOn;
pub use trampoline::ResubscribeDriver;
