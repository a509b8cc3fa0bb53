//! TTL expiry policy.

use std::time::Duration;

/// Returns true once an entry is strictly older than `ttl`.
///
/// An entry exactly `ttl` old is still live. A `stored_at` in the future
/// (clock skew) is treated as fresh.
pub fn is_expired(stored_at_millis: i64, now_millis: i64, ttl: Duration) -> bool {
    let age = i128::from(now_millis) - i128::from(stored_at_millis);
    age > i128::try_from(ttl.as_millis()).unwrap_or(i128::MAX)
}

/// Process-wide TTL, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    ttl: Duration,
}

impl ExpiryPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_expired(&self, stored_at_millis: i64, now_millis: i64) -> bool {
        is_expired(stored_at_millis, now_millis, self.ttl)
    }
}
