use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use super::{BackoffError, Retryable};
use crate::config::BackoffSettings;

/// Multiplier applied to the base delay for the first retry.
const RETRY_DELAY_FACTOR: u32 = 10;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone)]
pub struct BackoffManager {
    settings: BackoffSettings,
    sleeper: Arc<dyn Sleeper>,
}

impl BackoffManager {
    pub fn new(settings: &BackoffSettings, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            settings: settings.clone(),
            sleeper,
        }
    }

    pub fn with_tokio(settings: &BackoffSettings) -> Self {
        Self::new(settings, Arc::new(TokioSleeper))
    }

    pub fn max_attempts(&self) -> u32 {
        self.settings.max_attempts
    }

    /// Delay before each attempt. Uniform over `[min_delay, max_delay]` in
    /// slow mode, the base delay otherwise.
    pub fn pacing_delay(&self) -> Duration {
        if self.settings.slow_mode {
            let min = self.settings.min_delay.as_secs_f64();
            let max = self.settings.max_delay.as_secs_f64();
            if max <= min {
                return self.settings.min_delay;
            }
            Duration::from_secs_f64(rand::rng().random_range(min..=max))
        } else {
            self.settings.base_delay
        }
    }

    /// `10 * base * 2^attempt`, with `attempt` counted from zero.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.settings
            .base_delay
            .saturating_mul(RETRY_DELAY_FACTOR.saturating_mul(2u32.saturating_pow(attempt.min(20))))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, BackoffError<E>>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            self.sleeper.sleep(self.pacing_delay()).await;

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                debug!("{} failed without retry: {}", label, err);
                return Err(BackoffError::Fatal(err));
            }

            if attempt + 1 >= attempts {
                warn!("{} still rate limited after {} attempts", label, attempts);
                return Err(BackoffError::Exhausted {
                    attempts,
                    last: err,
                });
            }

            let mut delay = self.retry_delay(attempt);
            if let Some(requested) = err.retry_after() {
                delay = delay.max(requested);
            }
            warn!(
                "{} failed (attempt {}/{}): {}, retrying in {:?}",
                label,
                attempt + 1,
                attempts,
                err,
                delay
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
