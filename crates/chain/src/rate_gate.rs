//! Shared rate budget and bounded retry for every RPC call.
//!
//! A [`RateGate`] spaces calls at least `min_interval` apart and retries
//! calls that fail with a rate-limit-class error, sleeping
//! `base_delay × attempt` between tries. Clones share one budget, so the
//! gateway and the oracle draw from the same allowance.

use binopt_core::{ChainError, RateLimitConfig};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

#[derive(Clone)]
pub struct RateGate {
    /// `None` when `min_interval` is zero (no spacing).
    limiter: Option<Arc<DirectLimiter>>,
    min_interval: Duration,
    max_retries: u32,
    base_delay: Duration,
}

impl RateGate {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(config.min_interval(), config.max_retries, config.base_delay())
    }

    #[must_use]
    pub fn with_limits(min_interval: Duration, max_retries: u32, base_delay: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| Arc::new(RateLimiter::direct(quota.allow_burst(nonzero!(1u32)))));

        Self {
            limiter,
            min_interval,
            max_retries,
            base_delay,
        }
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Waits until the budget allows one more call.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Runs `op` under the gate, retrying rate-limit-class failures.
    ///
    /// # Errors
    /// Non-rate-limit errors are returned as-is on first occurrence. Once
    /// `max_retries` retries are spent the last failure is surfaced as
    /// [`ChainError::RateLimited`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.wait().await;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(call = label, attempts = attempt, error = %err, "Rate limit retries exhausted");
                        return Err(ChainError::RateLimited {
                            attempts: attempt,
                            message: err.to_string(),
                        });
                    }
                    let delay = self.base_delay * attempt;
                    debug!(
                        call = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("min_interval", &self.min_interval)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}
