//! Keepalive tracking
//!
//! Detects dead connections when keepalive pings are enabled: if a ping
//! goes unanswered for longer than the timeout, the connection is reported
//! as failed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks ping/pong round trips for one connection
///
/// Timestamps are stored as milliseconds since the tracker was created so
/// they fit in atomics.
#[derive(Debug)]
pub struct KeepaliveTracker {
    epoch: Instant,
    last_ping_sent_ms: AtomicU64,
    last_pong_received_ms: AtomicU64,
    timeout: Duration,
}

impl KeepaliveTracker {
    /// Tracker that tolerates two missed intervals
    pub fn for_interval(interval: Duration) -> Self {
        Self::new(interval.saturating_mul(2))
    }

    pub fn new(timeout: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            last_ping_sent_ms: AtomicU64::new(0),
            last_pong_received_ms: AtomicU64::new(0),
            timeout,
        }
    }

    fn now_ms(&self) -> u64 {
        // +1 keeps a ping sent in the first millisecond distinguishable from "never"
        self.epoch.elapsed().as_millis() as u64 + 1
    }

    pub fn record_ping_sent(&self) {
        let ms = self.now_ms();
        // Only the first unanswered ping starts the clock
        let _ = self.last_ping_sent_ms.fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
            let pong = self.last_pong_received_ms.load(Ordering::Acquire);
            if prev == 0 || pong >= prev {
                Some(ms)
            } else {
                None
            }
        });
    }

    pub fn record_pong_received(&self) {
        self.last_pong_received_ms.store(self.now_ms(), Ordering::Release);
    }

    /// False once a ping has waited longer than the timeout for its pong
    pub fn is_healthy(&self) -> bool {
        let ping_ms = self.last_ping_sent_ms.load(Ordering::Acquire);
        let pong_ms = self.last_pong_received_ms.load(Ordering::Acquire);

        if ping_ms == 0 || pong_ms >= ping_ms {
            return true;
        }

        let waited = Duration::from_millis(self.now_ms().saturating_sub(ping_ms));
        waited <= self.timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
