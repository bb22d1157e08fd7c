use crate::backoff;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retries an operation on errors its classifier accepts, sleeping per [`backoff::delay`].
///
/// With `max_retries = Some(m)` an operation that keeps failing is attempted `m + 1`
/// times in total before the last error is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Retry {
    max_retries: Option<u32>,
}

impl Retry {
    pub fn new(max_retries: Option<u32>) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub async fn execute<T, F, Fut, C>(&self, operation: F, is_retriable: C) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> bool,
    {
        self.execute_with_sleep(operation, is_retriable, tokio::time::sleep)
            .await
    }

    pub async fn execute_with_sleep<T, F, Fut, C, S, SFut>(
        &self,
        mut operation: F,
        is_retriable: C,
        mut sleep: S,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> bool,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let mut retry = 0u32;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            // 4xx responses are never retried, whatever the classifier says.
            if !is_retriable(&err) || matches!(err, Error::Http { status, .. } if status < 500) {
                return Err(err);
            }

            retry += 1;
            if matches!(self.max_retries, Some(max) if retry > max) {
                warn!(kind = err.kind_name(), "[Retryable errors] Retry limit reached");
                return Err(err);
            }

            let wait = backoff::delay(retry);
            let total = self
                .max_retries
                .map_or_else(|| "-".to_string(), |max| max.to_string());
            warn!(
                attempt = retry,
                max_attempts = ?self.max_retries,
                kind = err.kind_name(),
                wait_secs = wait.as_secs_f64(),
                "[Retryable error {}/{}] {} ({}). Wait {:.1} seconds",
                retry,
                total,
                err.kind_name(),
                err,
                wait.as_secs_f64()
            );
            sleep(wait).await;
        }
    }
}
