use std::future::Future;
use std::time::Duration;

/// Exponential back-off (base 2, min 1s, max 10s), shared by both Resolver
/// stages (SPEC_FULL.md §4.3).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: 2.0,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.min_delay.as_secs_f64() * self.base.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping with exponential
/// back-off between attempts that `should_retry` approves. Non-retryable
/// errors (validation/parse failures) return immediately.
pub async fn retry_async<T, E, F, Fut, ShouldRetry>(
    policy: RetryPolicy,
    should_retry: ShouldRetry,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    ShouldRetry: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}
