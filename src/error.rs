//! Error types raised by the library itself.
//!
//! Upstream errors are never wrapped: they travel through the operators as the
//! user's own `Err` type and reach the subscriber verbatim.

use std::time::Duration;

use thiserror::Error;

/// Rejected operator configuration, reported at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("retry bound must be >= 0, got {0}")]
  NegativeRetryBound(i64),
}

/// Failures of the graceful-shutdown contract of a [`ShutdownGroup`].
///
/// [`ShutdownGroup`]: crate::shutdown::ShutdownGroup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShutdownError {
  #[error("{open} subscription(s) did not confirm cancellation within {timeout:?}")]
  Timeout { open: usize, timeout: Duration },

  #[error("this shutdown group has already been shut down")]
  AlreadyShutDown,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxdemand_macro::test]
  fn messages_name_the_offending_value() {
    assert_eq!(ConfigError::NegativeRetryBound(-3).to_string(), "retry bound must be >= 0, got -3");

    let timeout = ShutdownError::Timeout { open: 2, timeout: Duration::from_millis(50) };
    assert_eq!(
      timeout.to_string(),
      "2 subscription(s) did not confirm cancellation within 50ms"
    );
  }
}
