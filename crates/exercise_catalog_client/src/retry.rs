use std::time::Duration;

/// A bounded retry policy with exponential backoff and jitter.
///
/// `max_retries` counts attempts after the first one, so the default policy
/// makes at most four calls.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub async fn retry_async<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.retry_async_if(f, |_| true).await
    }

    /// Like [`retry_async`](Self::retry_async) but gives up at once when
    /// `should_retry` rejects the error.
    pub async fn retry_async_if<F, Fut, T, E, P>(&self, mut f: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "attempt {} failed: {}; retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    // exponential backoff with jitter
    fn delay_for(&self, attempt: u32) -> Duration {
        let max_delay = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let max_ms = max_delay.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random_range(0..max_ms))
    }
}
