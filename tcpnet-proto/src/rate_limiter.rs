//! Token-bucket rate limiting for outbound byte volume.
//!
//! The bucket holds up to `bucket_size` tokens, one per byte, and refills at
//! `bytes_per_second`. Tokens are fractional so slow rates still refill
//! smoothly between calls.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep inside [`RateLimiter::wait_for_bytes`].
const POLL_STEP: Duration = Duration::from_millis(10);

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens (bytes) added per second.
    pub bytes_per_second: u64,

    /// Burst capacity. Zero means "same as the rate".
    #[serde(default)]
    pub bucket_size: u64,
}

impl RateLimitConfig {
    pub fn new(bytes_per_second: u64) -> Self {
        Self {
            bytes_per_second,
            bucket_size: 0,
        }
    }

    /// Set the burst capacity.
    #[must_use]
    pub fn with_bucket_size(mut self, size: u64) -> Self {
        self.bucket_size = size;
        self
    }

    /// Build a limiter starting with a full bucket.
    pub fn build(&self) -> RateLimiter {
        RateLimiter::new(self.bytes_per_second, self.bucket_size)
    }
}

struct Bucket {
    capacity: f64,
    rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    /// Tokens available at `now`, without committing the refill.
    fn projected(&self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.rate).min(self.capacity)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        self.tokens = self.projected(now);
        self.last_refill = now;
    }
}

/// Token-bucket rate limiter. Safe to share between threads.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter refilling at `bytes_per_second` with capacity
    /// `bucket_size` (or the rate itself when `bucket_size` is zero).
    /// The bucket starts full.
    pub fn new(bytes_per_second: u64, bucket_size: u64) -> Self {
        let capacity = if bucket_size == 0 {
            bytes_per_second
        } else {
            bucket_size
        } as f64;
        Self {
            bucket: Mutex::new(Bucket {
                capacity,
                rate: bytes_per_second as f64,
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Admit `bytes` if enough tokens are available, consuming them.
    ///
    /// A rejected request leaves the bucket untouched apart from the refill.
    pub fn allow_bytes(&self, bytes: u64) -> bool {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        let needed = bytes as f64;
        if bucket.tokens >= needed {
            bucket.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Time until `bytes` tokens would be available if nothing else is consumed.
    ///
    /// Returns [`Duration::ZERO`] when admissible now and [`Duration::MAX`]
    /// when the rate is zero and the bucket is short.
    pub fn delay_for(&self, bytes: u64) -> Duration {
        let bucket = self.bucket.lock();
        let available = bucket.projected(Instant::now());
        let deficit = bytes as f64 - available;
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        if bucket.rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64(deficit / bucket.rate).unwrap_or(Duration::MAX)
    }

    /// Block until `bytes` are admitted.
    ///
    /// Polls [`RateLimiter::allow_bytes`], sleeping at most 10ms between
    /// attempts. Returns false straight away if `bytes` exceeds the bucket
    /// capacity, since such a request can never be admitted.
    pub fn wait_for_bytes(&self, bytes: u64) -> bool {
        self.wait_until(bytes, None)
    }

    /// Like [`RateLimiter::wait_for_bytes`] but gives up after `timeout`.
    pub fn wait_for_bytes_timeout(&self, bytes: u64, timeout: Duration) -> bool {
        self.wait_until(bytes, Instant::now().checked_add(timeout))
    }

    fn wait_until(&self, bytes: u64, deadline: Option<Instant>) -> bool {
        if bytes > self.bucket_size() {
            return false;
        }
        loop {
            if self.allow_bytes(bytes) {
                return true;
            }
            let mut step = self.delay_for(bytes).clamp(Duration::from_millis(1), POLL_STEP);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                step = step.min(deadline - now);
            }
            thread::sleep(step);
        }
    }

    /// Change the refill rate. Tokens accrued so far are kept.
    pub fn set_rate(&self, bytes_per_second: u64) {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.rate = bytes_per_second as f64;
    }

    /// Change the capacity, clamping the available tokens to it.
    pub fn set_bucket_size(&self, size: u64) {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.capacity = size as f64;
        bucket.tokens = bucket.tokens.min(bucket.capacity);
    }

    pub fn rate(&self) -> u64 {
        self.bucket.lock().rate as u64
    }

    pub fn bucket_size(&self) -> u64 {
        self.bucket.lock().capacity as u64
    }

    /// Whole tokens available right now.
    pub fn available_bytes(&self) -> u64 {
        let bucket = self.bucket.lock();
        bucket.projected(Instant::now()).floor() as u64
    }

    /// Fraction of the bucket currently consumed, `1 - available / capacity`.
    pub fn utilization(&self) -> f64 {
        let bucket = self.bucket.lock();
        if bucket.capacity <= 0.0 {
            return 0.0;
        }
        1.0 - bucket.projected(Instant::now()) / bucket.capacity
    }

    /// Refill the bucket to capacity.
    pub fn reset(&self) {
        let mut bucket = self.bucket.lock();
        bucket.tokens = bucket.capacity;
        bucket.last_refill = Instant::now();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bucket = self.bucket.lock();
        f.debug_struct("RateLimiter")
            .field("rate", &bucket.rate)
            .field("capacity", &bucket.capacity)
            .field("tokens", &bucket.tokens)
            .finish()
    }
}
