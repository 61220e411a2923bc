use std::time::Instant;

/// Token bucket for a single client.
///
/// Holds up to `capacity` tokens and refills continuously at `rate` tokens
/// per second. Every admitted request spends one token.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    /// A full bucket.
    ///
    /// * `rate`     - tokens added per second
    /// * `capacity` - burst size
    pub fn new(rate: f64, capacity: u32, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        Self { tokens: capacity, last_refill: now, rate, capacity }
    }

    /// Refills for the time elapsed since the last call, then spends one
    /// token if a whole one is available.
    ///
    /// Returns `true` when the request is admitted. A denied call still
    /// advances `last_refill`, so elapsed time is only ever counted once.
    pub fn consume(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill(&mut self, now: Instant) {
        // Instants from other threads can be observed slightly out of order;
        // saturate instead of going negative.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}
