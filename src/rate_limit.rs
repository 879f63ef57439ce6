//! Per-session request rate limiting.
//!
//! A classic token bucket: `rate` tokens refill per second up to `burst`
//! capacity, and each request consumes one token. This differs from the
//! teacher's tumbling-window `RpcRateLimiter` (which resets a counter once a
//! minute) because the spec calls for burst tolerance within a sub-second
//! window (§3: rate 10/s, burst 20) rather than a per-minute cap.

use std::sync::Mutex;
use std::time::Instant;

pub struct TokenBucket {
    state: Mutex<BucketState>,
    rate_per_sec: f64,
    burst: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            rate_per_sec,
            burst,
        }
    }

    /// Attempt to consume one token. Returns `true` if a token was available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
