//! Per-key log throttling.
//!
//! Noisy per-symbol diagnostics ("stuck" ticks, snapshot field churn)
//! are rate-limited to one line per key per interval.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Per-key rate limiter for log lines.
pub struct LogThrottle {
    interval_ms: i64,
    last_logged: Mutex<HashMap<String, i64>>,
}

impl LogThrottle {
    /// Create a throttle that allows one line per key per `interval_ms`.
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            last_logged: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true (and arms the interval) if `key` may log at `now_ms`.
    pub fn should_log(&self, key: &str, now_ms: i64) -> bool {
        let mut map = self.last_logged.lock();
        match map.get(key) {
            Some(&last) if now_ms - last < self.interval_ms => false,
            _ => {
                map.insert(key.to_string(), now_ms);
                true
            }
        }
    }

    /// Forget a key so its next line logs immediately.
    pub fn reset(&self, key: &str) {
        self.last_logged.lock().remove(key);
    }

    /// Forget every key.
    pub fn clear(&self) {
        self.last_logged.lock().clear();
    }
}
