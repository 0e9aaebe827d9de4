//! Bounded retry keyed on the error
//!
//! Some mutations fail transiently with specific status codes (412 while a
//! revision settles, 400 while a soft-deleted service is still being
//! purged). [`retry_if`] re-runs the operation only for errors the predicate
//! accepts, up to a fixed number of attempts and never past the context
//! deadline.

use super::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tfplug::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(10),
        }
    }
}

pub async fn retry_if<T, F, Fut, P>(
    ctx: &Context,
    policy: RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    P: Fn(&ApiError) -> bool,
{
    if ctx.is_cancelled() {
        return Err(ApiError::Cancelled);
    }

    let mut attempt = 1;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }
        if attempt >= policy.max_attempts.max(1) {
            tracing::warn!("Giving up after {} attempts: {}", attempt, err);
            return Err(err);
        }

        tracing::debug!(
            "Retryable error on attempt {}, retrying after {:?}: {}",
            attempt,
            policy.delay,
            err
        );
        if !ctx.sleep(policy.delay).await {
            return Err(err);
        }
        attempt += 1;
    }
}

pub fn is_precondition_failed(err: &ApiError) -> bool {
    err.is_precondition_failed()
}

pub fn is_bad_request(err: &ApiError) -> bool {
    err.is_bad_request()
}

pub fn is_conflict(err: &ApiError) -> bool {
    err.is_conflict()
}
