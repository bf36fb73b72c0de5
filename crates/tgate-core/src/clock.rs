//! Wall-clock abstraction and minute-boundary helpers.
//!
//! All rate limits in the engine are phrased against wall-clock minutes
//! (blocked re-evaluation, live entry throttling, force-close windows).
//! IST's UTC offset is a whole number of minutes, so minute indices and
//! second-of-minute agree with plain epoch math; IST appears only in
//! displayed timestamps.

use chrono::{FixedOffset, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// IST offset from UTC in seconds (+05:30).
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Source of "now" for every time-sensitive decision.
///
/// Production uses [`WallClock`]; tests drive [`ManualClock`].
pub trait Clock: Send + Sync {
    /// Current time as Unix milliseconds.
    fn now_ms(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl Clock for WallClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Settable clock for tests.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Index of the wall-clock minute containing `ms`.
#[inline]
pub fn minute_index(ms: i64) -> i64 {
    ms.div_euclid(60_000)
}

/// Second within the wall-clock minute containing `ms` (0..=59).
#[inline]
pub fn second_of_minute(ms: i64) -> i64 {
    ms.div_euclid(1_000).rem_euclid(60)
}

/// Whether `ms` falls in the first second of its minute.
#[inline]
pub fn is_minute_start(ms: i64) -> bool {
    second_of_minute(ms) == 0
}

/// First millisecond of the minute after the one containing `ms`.
#[inline]
pub fn next_minute_start_ms(ms: i64) -> i64 {
    (minute_index(ms) + 1) * 60_000
}

/// Render a Unix-ms timestamp as an IST wall-clock string.
pub fn ist_time_string(ms: i64) -> String {
    let offset = FixedOffset::east_opt(IST_OFFSET_SECS).expect("static IST offset");
    match offset.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}
