use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::asr::RecognitionError;

/// Bounded exponential backoff for transient vendor failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, vendor: &str, mut op: F) -> Result<T, RecognitionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RecognitionError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        vendor,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Recognition attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Bounds a whole recognition (all attempts included) by `max_wait`.
///
/// Expiry is reported as a transport failure; nothing recognized so far is kept.
pub async fn with_deadline<T, Fut>(max_wait: Duration, fut: Fut) -> Result<T, RecognitionError>
where
    Fut: Future<Output = Result<T, RecognitionError>>,
{
    match tokio::time::timeout(max_wait, fut).await {
        Ok(result) => result,
        Err(_) => Err(RecognitionError::transport(format!(
            "recognition timed out after {}s",
            max_wait.as_secs()
        ))),
    }
}
