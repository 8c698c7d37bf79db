use crate::clock::Clock;
use crate::model::RateProfile;
use crate::rate_limit::{Decision, REFILL_INTERVAL};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A classic token bucket with interval refill.
///
/// Capacity equals the per-interval refill, so a full bucket holds exactly one interval's
/// quota. Refill is lazy: each call first credits `refill` tokens for every whole interval
/// elapsed since the last refill, capped at capacity, then evaluates consumption. Partial
/// intervals carry over to the next call.
///
/// The check-and-decrement runs under one lock, so concurrent callers sharing a bucket
/// never spend the same token twice.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug)]
struct BucketState {
    capacity: u64,
    refill: u64,
    interval_millis: u64,
    tokens: u64,
    last_refill_millis: u64,
}

impl BucketState {
    fn refill(&mut self, now: u64) {
        let elapsed = now.saturating_sub(self.last_refill_millis);
        let intervals = elapsed / self.interval_millis;
        if intervals == 0 {
            return;
        }
        let credit = intervals.saturating_mul(self.refill);
        self.tokens = self.tokens.saturating_add(credit).min(self.capacity);
        self.last_refill_millis += intervals * self.interval_millis;
    }

    fn until_next_refill(&self, now: u64) -> Duration {
        let elapsed = now.saturating_sub(self.last_refill_millis);
        Duration::from_millis(self.interval_millis.saturating_sub(elapsed).max(1))
    }
}

impl TokenBucket {
    /// Create a full bucket holding `rate` tokens, topped up by `rate` every `interval`.
    pub fn new(rate: NonZeroU32, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = u64::from(rate.get());
        let interval_millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
        let now = clock.now_millis();
        Self {
            state: Mutex::new(BucketState {
                capacity,
                refill: capacity,
                interval_millis,
                tokens: capacity,
                last_refill_millis: now,
            }),
            clock,
        }
    }

    /// Bucket sized to one minute of the profile's rate. `None` if the rate is zero.
    pub fn from_profile(profile: &RateProfile, clock: Arc<dyn Clock>) -> Option<Self> {
        NonZeroU32::new(profile.tokens_per_minute).map(|rate| Self::new(rate, REFILL_INTERVAL, clock))
    }

    /// Take `n` tokens if available. Leaves the bucket untouched on rejection.
    pub fn try_consume(&self, n: u64) -> bool {
        self.try_acquire(n).is_allowed()
    }

    /// Like [`try_consume`](Self::try_consume) but reports what is left, or how long
    /// until the next refill.
    pub fn try_acquire(&self, n: u64) -> Decision {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.refill(now);
        if state.tokens >= n {
            state.tokens -= n;
            Decision::Allowed { remaining: state.tokens }
        } else {
            Decision::Denied { wait: state.until_next_refill(now) }
        }
    }

    /// Tokens currently available, after applying any due refill.
    pub fn available_tokens(&self) -> u64 {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.refill(now);
        state.tokens
    }

    /// Maximum tokens the bucket holds; equal to the per-interval rate.
    pub fn capacity(&self) -> u64 {
        self.lock().capacity
    }

    /// Change the rate in place. Capacity follows the rate; tokens above the new
    /// capacity are dropped.
    pub fn reconfigure(&self, rate: NonZeroU32) {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.refill(now);
        state.capacity = u64::from(rate.get());
        state.refill = state.capacity;
        state.tokens = state.tokens.min(state.capacity);
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // Critical sections never panic, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
