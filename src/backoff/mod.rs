//! Paced, retrying execution of platform operations.
//!
//! Every attempt is preceded by a short pacing delay. Retryable failures
//! back off exponentially from ten times the base delay; anything else
//! surfaces immediately.

mod manager;

pub use manager::{BackoffManager, Sleeper, TokioSleeper};

use crate::platform::PlatformError;
use std::time::Duration;
use thiserror::Error;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Minimum wait the remote side asked for, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for PlatformError {
    fn is_retryable(&self) -> bool {
        PlatformError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        PlatformError::retry_after(self)
    }
}

#[derive(Debug, Error)]
pub enum BackoffError<E> {
    /// Rate limiting persisted through every attempt.
    #[error("rate limited after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error(transparent)]
    Fatal(E),
}

impl<E> BackoffError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, BackoffError::Exhausted { .. })
    }

    pub fn into_inner(self) -> E {
        match self {
            BackoffError::Exhausted { last, .. } => last,
            BackoffError::Fatal(e) => e,
        }
    }
}
