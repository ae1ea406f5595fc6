use std::sync::Mutex;
use std::time::Instant;

/// Process-wide token bucket. One shared instance gates every token
/// validation, whichever channel the token arrived on.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<Bucket>,
    rate_per_sec: f64,
    burst: f64,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl RateLimiter {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self {
            state: Mutex::new(Bucket {
                tokens: burst as f64,
                last: Instant::now(),
            }),
            rate_per_sec,
            burst: burst as f64,
        }
    }

    /// Take one token if available. Non-blocking; callers map a refusal to
    /// `RateLimited`, never to an invalid-token failure.
    pub fn allow(&self) -> bool {
        let mut bucket = self.state.lock().unwrap();
        let now = Instant::now();

        let elapsed = now.duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    /// The auth core's production sizing: ~10 validations/s, burst 30.
    fn default() -> Self {
        Self::new(10.0, 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn burst_is_honoured_then_exhausted() {
        let limiter = RateLimiter::new(10.0, 30);
        let allowed = (0..35).filter(|_| limiter.allow()).count();
        // The full burst passes; immediate follow-ups are refused.
        assert!(allowed >= 30 && allowed <= 31, "allowed {allowed}");
        assert!(!limiter.allow());
    }

    #[test]
    fn bucket_refills_at_the_configured_rate() {
        let limiter = RateLimiter::new(40.0, 10);
        while limiter.allow() {}

        std::thread::sleep(Duration::from_millis(250));

        // 40/s for 250ms is ~10 tokens; allow 10% tolerance either way.
        let allowed = (0..20).filter(|_| limiter.allow()).count();
        assert!((8..=12).contains(&allowed), "allowed {allowed}");
    }

    #[test]
    fn refill_never_exceeds_burst() {
        let limiter = RateLimiter::new(1000.0, 5);
        std::thread::sleep(Duration::from_millis(50));
        let allowed = (0..20).filter(|_| limiter.allow()).count();
        assert!(allowed <= 6, "allowed {allowed}");
    }
}
