//! Connection settings for [`crate::HttpRepository`].

use std::time::Duration;

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// How often an idempotent request is attempted before giving up.
///
/// Only network failures and 5xx answers are retried, and only for `GET`,
/// `PUT` and `DELETE`. `POST` is sent exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts including the first; `1` disables retrying.
  pub max_attempts: u32,
  /// Wait before the second attempt; doubled for each one after.
  pub backoff:      Duration,
}

impl RetryPolicy {
  pub fn none() -> Self { Self { max_attempts: 1, backoff: Duration::ZERO } }

  pub(crate) fn delay(&self, attempt: u32) -> Duration {
    self.backoff.saturating_mul(1 << attempt.saturating_sub(1).min(16))
  }
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { max_attempts: 3, backoff: Duration::from_millis(200) } }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Server root, e.g. `http://localhost:8080`. The API prefix is appended.
  pub base_url: String,
  pub timeout:  Duration,
  pub retry:    RetryPolicy,
}

impl ClientConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { base_url: base_url.into(), timeout: DEFAULT_TIMEOUT, retry: RetryPolicy::default() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles() {
    let p = RetryPolicy { max_attempts: 4, backoff: Duration::from_millis(100) };
    assert_eq!(p.delay(1), Duration::from_millis(100));
    assert_eq!(p.delay(2), Duration::from_millis(200));
    assert_eq!(p.delay(3), Duration::from_millis(400));
  }
}
