//! Bounded retries with exponential backoff for transient deploy service failures.
use std::{future::Future, time::Duration};

use tracing::warn;

use crate::dependencies::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Retries without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before the retry following the failed attempt number `attempt` (zero based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped_delay = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_delay)
    }

    /// Run `request` until it succeeds, fails permanently or the attempts are exhausted.
    ///
    /// Only [`ClientError::is_transient`] errors are retried, the last error is returned otherwise.
    pub async fn run<T, F, Fut>(&self, what: &str, mut request: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(what, attempt, ?delay, %error, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
