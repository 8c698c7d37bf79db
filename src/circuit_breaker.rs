//! Circuit breaker implementation with lock-free atomics

use crate::clock::{Clock, MonotonicClock};
use crate::error::ResilienceError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;
const STATE_FORCED_OPEN: u8 = 3;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operating mode.
    Closed,
    /// Short-circuits calls until recovery timeout elapses.
    Open,
    /// Probe mode allowing a limited number of calls to test recovery.
    HalfOpen,
    /// Held open by an operator; only [`CircuitBreaker::reset`] closes it.
    ForcedOpen,
}

impl CircuitState {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            STATE_CLOSED => Some(CircuitState::Closed),
            STATE_OPEN => Some(CircuitState::Open),
            STATE_HALF_OPEN => Some(CircuitState::HalfOpen),
            STATE_FORCED_OPEN => Some(CircuitState::ForcedOpen),
            _ => None,
        }
    }
}

/// Validated configuration for the circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    failure_threshold: usize,
    recovery_timeout: Duration,
    half_open_max_calls: usize,
}

/// Errors produced when validating breaker configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitBreakerError {
    /// Failure threshold must be > 0.
    #[error("failure_threshold must be > 0 (got {provided})")]
    InvalidFailureThreshold {
        /// Value provided by caller.
        provided: usize,
    },
    /// Recovery timeout must be > 0.
    #[error("recovery_timeout must be > 0 (got {0:?})")]
    InvalidRecoveryTimeout(Duration),
    /// Half-open probe limit must be > 0.
    #[error("half_open_max_calls must be > 0 (got {provided})")]
    InvalidHalfOpenLimit {
        /// Value provided by caller.
        provided: usize,
    },
}

impl CircuitBreakerConfig {
    /// Create a config with validation.
    pub fn new(
        failure_threshold: usize,
        recovery_timeout: Duration,
        half_open_max_calls: usize,
    ) -> Result<Self, CircuitBreakerError> {
        if failure_threshold == 0 {
            return Err(CircuitBreakerError::InvalidFailureThreshold { provided: 0 });
        }
        if half_open_max_calls == 0 {
            return Err(CircuitBreakerError::InvalidHalfOpenLimit { provided: 0 });
        }
        if recovery_timeout.is_zero() {
            return Err(CircuitBreakerError::InvalidRecoveryTimeout(recovery_timeout));
        }
        Ok(Self { failure_threshold, recovery_timeout, half_open_max_calls })
    }

    /// Consecutive failures that open the circuit from Closed.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Duration to stay Open before Half-Open probes.
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Maximum concurrent calls while Half-Open.
    pub fn half_open_max_calls(&self) -> usize {
        self.half_open_max_calls
    }
}

#[derive(Debug)]
struct BreakerState {
    state: AtomicU8,
    failure_count: AtomicUsize,
    opened_at_millis: AtomicU64,
    half_open_calls: AtomicUsize,
}

/// Circuit breaker guarding one remote dependency.
///
/// Clones share the same underlying state via `Arc`, so every handle observes and affects the
/// same lifecycle (failure counts, open/half-open/closed transitions).
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    state: Arc<BreakerState>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a closed breaker reading time from a [`MonotonicClock`].
    pub fn new(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(BreakerState {
                state: AtomicU8::new(STATE_CLOSED),
                failure_count: AtomicUsize::new(0),
                opened_at_millis: AtomicU64::new(0),
                half_open_calls: AtomicUsize::new(0),
            }),
            config,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. An Open circuit whose recovery timeout has elapsed still reports Open
    /// until the next call moves it to HalfOpen.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.state.load(Ordering::Acquire)).unwrap_or(CircuitState::Open)
    }

    /// Consecutive failures recorded since the last success or reset.
    pub fn failure_count(&self) -> usize {
        self.state.failure_count.load(Ordering::Acquire)
    }

    /// Hold the circuit open regardless of call outcomes until [`reset`](Self::reset).
    pub fn force_open(&self) {
        self.state.opened_at_millis.store(self.now_millis(), Ordering::Release);
        let previous = self.state.state.swap(STATE_FORCED_OPEN, Ordering::AcqRel);
        if previous != STATE_FORCED_OPEN {
            tracing::warn!(breaker = %self.name, "Circuit breaker forced open");
        }
    }

    /// Close the circuit and clear all counters.
    pub fn reset(&self) {
        self.state.failure_count.store(0, Ordering::Release);
        self.state.half_open_calls.store(0, Ordering::Release);
        self.state.opened_at_millis.store(0, Ordering::Release);
        let previous = self.state.state.swap(STATE_CLOSED, Ordering::AcqRel);
        if previous != STATE_CLOSED {
            tracing::info!(breaker = %self.name, "Circuit breaker reset → closed");
        }
    }

    /// Executes the provided async operation under circuit breaker protection.
    ///
    /// # Behavior
    /// - **Closed**: Executes the operation normally. Consecutive failures increment the failure count.
    /// - **Open**: Rejects calls with `ResilienceError::CircuitOpen` until `recovery_timeout` elapses.
    /// - **HalfOpen**: Allows limited test calls (`half_open_max_calls`). Success closes the circuit; failure reopens it.
    /// - **ForcedOpen**: Rejects every call.
    ///
    /// Any `Err` from the operation counts as a failure, including a `Timeout` produced inside it.
    ///
    /// # Errors
    /// Returns `ResilienceError::CircuitOpen` if the circuit is open or half-open capacity is exceeded.
    /// Otherwise returns whatever error the operation produced.
    pub async fn execute<T, E, Fut, Op>(&self, operation: Op) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        E: Send,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        struct HalfOpenGuard<'a> {
            state: &'a BreakerState,
        }
        impl Drop for HalfOpenGuard<'_> {
            fn drop(&mut self) {
                self.state.half_open_calls.fetch_sub(1, Ordering::Release);
            }
        }
        let mut guard: Option<HalfOpenGuard<'_>> = None;

        loop {
            let current = self.state();
            match current {
                CircuitState::ForcedOpen => return Err(self.rejection()),
                CircuitState::Open => {
                    let opened_at = self.state.opened_at_millis.load(Ordering::Acquire);
                    let elapsed = self.now_millis().saturating_sub(opened_at);
                    if elapsed < duration_millis(self.config.recovery_timeout) {
                        return Err(self.rejection());
                    }
                    match self.state.state.compare_exchange(
                        STATE_OPEN,
                        STATE_HALF_OPEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            // First caller after the timeout becomes the first probe.
                            tracing::info!(breaker = %self.name, "Circuit breaker → half-open");
                            self.state.half_open_calls.store(1, Ordering::Release);
                            guard = Some(HalfOpenGuard { state: &self.state });
                            break;
                        }
                        Err(STATE_CLOSED) => break,
                        Err(_) => continue,
                    }
                }
                CircuitState::HalfOpen => {
                    let in_flight = self.state.half_open_calls.fetch_add(1, Ordering::AcqRel);
                    if in_flight >= self.config.half_open_max_calls {
                        self.state.half_open_calls.fetch_sub(1, Ordering::Release);
                        return Err(self.rejection());
                    }
                    guard = Some(HalfOpenGuard { state: &self.state });
                    tracing::debug!(
                        breaker = %self.name,
                        in_flight = in_flight + 1,
                        max = self.config.half_open_max_calls,
                        "Circuit breaker: half-open test request"
                    );
                    break;
                }
                CircuitState::Closed => break,
            }
        }

        let result = operation().await;
        drop(guard);

        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        result
    }

    fn rejection<E>(&self) -> ResilienceError<E> {
        let opened_at = self.state.opened_at_millis.load(Ordering::Acquire);
        ResilienceError::CircuitOpen {
            failure_count: self.failure_count(),
            open_duration: Duration::from_millis(self.now_millis().saturating_sub(opened_at)),
        }
    }

    /// Any success in the closed state resets the counter, so only consecutive failures trip
    /// the breaker (F-F-S-F-F does not open it unless the final streak meets the threshold).
    fn on_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                if self
                    .state
                    .state
                    .compare_exchange(STATE_HALF_OPEN, STATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.state.half_open_calls.store(0, Ordering::Release);
                    self.state.failure_count.store(0, Ordering::Release);
                    self.state.opened_at_millis.store(0, Ordering::Release);
                    tracing::info!(breaker = %self.name, "Circuit breaker → closed");
                }
            }
            CircuitState::Closed => {
                self.state.failure_count.store(0, Ordering::Release);
            }
            CircuitState::Open | CircuitState::ForcedOpen => {}
        }
    }

    fn on_failure(&self) {
        let current = self.state();
        if current == CircuitState::ForcedOpen {
            return;
        }
        let failures = self.state.failure_count.fetch_add(1, Ordering::AcqRel) + 1;

        match current {
            CircuitState::HalfOpen => {
                if self
                    .state
                    .state
                    .compare_exchange(STATE_HALF_OPEN, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.state.half_open_calls.store(0, Ordering::Release);
                    self.state.opened_at_millis.store(self.now_millis(), Ordering::Release);
                    tracing::warn!(breaker = %self.name, failures, "Circuit breaker: test failed → open");
                }
            }
            CircuitState::Closed => {
                if failures >= self.config.failure_threshold
                    && self
                        .state
                        .state
                        .compare_exchange(STATE_CLOSED, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    self.state.half_open_calls.store(0, Ordering::Release);
                    self.state.opened_at_millis.store(self.now_millis(), Ordering::Release);
                    tracing::error!(
                        breaker = %self.name,
                        failures,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker → open"
                    );
                }
            }
            CircuitState::Open | CircuitState::ForcedOpen => {}
        }
    }

    fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
