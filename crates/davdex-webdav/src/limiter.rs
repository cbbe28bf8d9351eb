//! Request pacing for the WebDAV transport
//!
//! A single token bucket spreads PROPFIND bursts out over time so recursive
//! scans don't hammer the server. Tokens refill at a constant rate; when
//! the bucket is empty, `acquire` sleeps until one is available.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Mutable bucket state, protected by a Mutex.
#[derive(Debug)]
struct LimiterInner {
    /// Fractional for smooth refill
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter for outbound requests
///
/// Thread-safe; share via `Arc`. The bucket starts full.
#[derive(Debug)]
pub struct RequestLimiter {
    capacity: u32,
    /// Tokens added per second
    refill_rate: f64,
    inner: Mutex<LimiterInner>,
}

impl RequestLimiter {
    /// Creates a limiter with the given burst capacity and refill rate
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            inner: Mutex::new(LimiterInner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Default pacing for PROPFIND traffic: bursts of 10, 5 req/s sustained
    pub fn with_defaults() -> Self {
        Self::new(10, 5.0)
    }

    fn refill(&self, inner: &mut LimiterInner) {
        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            inner.tokens = (inner.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
            inner.last_refill = now;
        }
    }

    fn try_acquire(&self) -> Result<(), Duration> {
        let mut inner = self.inner.lock().unwrap();
        self.refill(&mut inner);

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - inner.tokens;
            let wait = if self.refill_rate > 0.0 {
                Duration::from_secs_f64(deficit / self.refill_rate)
            } else {
                Duration::from_secs(3600)
            };
            Err(wait)
        }
    }

    /// Acquires one token, sleeping until the bucket refills if necessary
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "Request limiter waiting");
                    tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
                }
            }
        }
    }
}
