use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use tutor_core::settings::BreakerSettings;

use crate::error::BreakerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
    /// Probe calls currently admitted in HALF_OPEN.
    probes: u32,
    /// Bumped on every entry into HALF_OPEN so permits from an earlier
    /// probing round never release a slot of the current one.
    round: u64,
}

/// CLOSED / OPEN / HALF_OPEN failure isolation for one external dependency.
///
/// Every check-and-transition happens under one mutex that is never held
/// across an await; the wrapped call runs unlocked. HALF_OPEN admits at most
/// `success_threshold` concurrent probes, and any failure there reopens the
/// circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_timeout: Duration,
    success_threshold: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, open_timeout: Duration, success_threshold: u32) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            open_timeout,
            success_threshold: success_threshold.max(1),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                successes: 0,
                last_failure: None,
                probes: 0,
                round: 0,
            }),
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: &BreakerSettings) -> Self {
        Self::new(name, settings.failure_threshold, settings.open_timeout(), settings.success_threshold)
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn state(&self) -> BreakerState { self.inner.lock().state }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock();
        BreakerStatus { state: inner.state, failure_count: inner.failures, success_count: inner.successes }
    }

    /// Runs `f` unless the circuit is open. Any `Err` from `f` counts as a
    /// failure; `Ok` counts as a success. A call whose future is dropped
    /// before it finishes (e.g. by an outer timeout) also counts as a failure.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(mut permit) = self.admit() else {
            return Err(BreakerError::Open);
        };
        let result = f().await;
        permit.settled = true;
        if result.is_ok() { self.on_success() } else { self.on_failure() }
        drop(permit);
        result.map_err(BreakerError::Inner)
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Some(Permit { breaker: self, probe_round: None, settled: false }),
            BreakerState::Open => {
                let cooled = inner.last_failure.map_or(true, |at| at.elapsed() > self.open_timeout);
                if !cooled {
                    return None;
                }
                info!(breaker = %self.name, "circuit breaker transitioning to HALF_OPEN");
                inner.state = BreakerState::HalfOpen;
                inner.successes = 0;
                inner.probes = 1;
                inner.round += 1;
                Some(Permit { breaker: self, probe_round: Some(inner.round), settled: false })
            }
            BreakerState::HalfOpen => {
                if inner.probes >= self.success_threshold {
                    return None;
                }
                inner.probes += 1;
                Some(Permit { breaker: self, probe_round: Some(inner.round), settled: false })
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.success_threshold {
                    info!(breaker = %self.name, "circuit breaker CLOSED after recovery");
                    inner.state = BreakerState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.probes = 0;
                }
            }
            BreakerState::Closed => inner.failures = 0,
            // A call admitted before the circuit opened; it does not close it.
            BreakerState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, circuit breaker OPEN again");
                inner.state = BreakerState::Open;
                inner.successes = 0;
                inner.probes = 0;
            }
            BreakerState::Closed if inner.failures >= self.failure_threshold => {
                error!(breaker = %self.name, failures = inner.failures, "circuit breaker OPEN");
                inner.state = BreakerState::Open;
                inner.successes = 0;
            }
            _ => {}
        }
    }
}

struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe_round: Option<u64>,
    /// Set once the call's outcome has been recorded.
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(breaker = %self.breaker.name, "call abandoned before completing, counted as a failure");
            self.breaker.on_failure();
        }
        let Some(round) = self.probe_round else { return };
        let mut inner = self.breaker.inner.lock();
        if inner.state == BreakerState::HalfOpen && inner.round == round {
            inner.probes = inner.probes.saturating_sub(1);
        }
    }
}
