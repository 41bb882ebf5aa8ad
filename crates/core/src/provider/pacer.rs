//! Per-host request pacing.
//!
//! Providers may ask for a minimum delay between two consecutive requests.
//! The pacer remembers when each host was last hit and makes callers wait
//! until the declared interval has elapsed.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Pool of last-request timestamps, one per host.
///
/// Thread-safe and async-compatible.
#[derive(Debug, Default)]
pub struct RequestPacer {
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RequestPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next slot for `host`.
    ///
    /// Returns how long the caller must wait before sending. The slot is
    /// recorded immediately so concurrent callers queue up behind each other.
    pub async fn reserve(&self, host: &str, interval: Duration) -> Duration {
        let mut last = self.last_request.lock().await;
        let now = Instant::now();

        let slot = match last.get(host) {
            Some(previous) => (*previous + interval).max(now),
            None => now,
        };
        last.insert(host.to_string(), slot);

        slot.saturating_duration_since(now)
    }

    /// Wait until `host` may be hit again.
    pub async fn wait(&self, host: &str, interval: Duration) {
        let delay = self.reserve(host, interval).await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
