//! Waiting for asynchronous state transitions
//!
//! [`StateWaiter`] repeatedly calls a refresh function until it reports a
//! target state a configured number of times in a row. Pending states keep
//! it waiting; any other state is an error. The context deadline bounds the
//! whole wait.

use super::common::ProvisioningState;
use super::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tfplug::Context;
use thiserror::Error;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PollError {
    #[error("timeout while waiting for state to become {target:?} (last state: {last_state:?})")]
    Timeout {
        last_state: String,
        target: Vec<String>,
    },

    #[error("unexpected state {state:?}, wanted target {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    #[error("couldn't find resource ({0} retries)")]
    NotFound(u32),

    #[error("cancelled while waiting for state to become {0:?}")]
    Cancelled(Vec<String>),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone)]
pub struct StateWaiter {
    pub pending: Vec<String>,
    /// Empty for deletions: the wait ends when the object is gone.
    pub target: Vec<String>,
    pub delay: Duration,
    pub min_interval: Duration,
    /// Fixed wait between refreshes; zero means exponential backoff.
    pub poll_interval: Duration,
    pub continuous_target_occurrence: u32,
    pub not_found_checks: u32,
}

impl StateWaiter {
    pub fn new(pending: &[&str], target: &[&str]) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            min_interval: Duration::ZERO,
            poll_interval: Duration::ZERO,
            continuous_target_occurrence: 1,
            not_found_checks: 20,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences.max(1);
        self
    }

    fn contains(states: &[String], state: &str) -> bool {
        states.iter().any(|s| s.eq_ignore_ascii_case(state))
    }

    fn next_wait(&self, previous: Duration) -> Duration {
        let wait = if !self.poll_interval.is_zero() {
            self.poll_interval
        } else if previous.is_zero() {
            INITIAL_BACKOFF
        } else {
            (previous * 2).min(MAX_BACKOFF)
        };
        wait.max(self.min_interval)
    }

    fn interrupted(&self, ctx: &Context, last_state: &str) -> PollError {
        if ctx.is_deadline_exceeded() {
            PollError::Timeout {
                last_state: last_state.to_string(),
                target: self.target.clone(),
            }
        } else {
            PollError::Cancelled(self.target.clone())
        }
    }

    /// Runs `refresh` until the target is reached. `refresh` returns
    /// `(None, _)` when the object does not exist.
    pub async fn wait_for_state<T, F, Fut>(
        &self,
        ctx: &Context,
        mut refresh: F,
    ) -> Result<Option<T>, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(Option<T>, String), ApiError>>,
    {
        let mut last_state = String::new();
        if !self.delay.is_zero() && !ctx.sleep(self.delay).await {
            return Err(self.interrupted(ctx, &last_state));
        }

        let mut wait = Duration::ZERO;
        let mut target_occurrences = 0;
        let mut not_found = 0;

        loop {
            if ctx.is_cancelled() {
                return Err(self.interrupted(ctx, &last_state));
            }

            let (result, state) = refresh().await?;
            match result {
                None if self.target.is_empty() => return Ok(None),
                None => {
                    not_found += 1;
                    target_occurrences = 0;
                    if not_found > self.not_found_checks {
                        return Err(PollError::NotFound(not_found));
                    }
                }
                Some(value) => {
                    not_found = 0;
                    if Self::contains(&self.target, &state) {
                        target_occurrences += 1;
                        if target_occurrences >= self.continuous_target_occurrence {
                            return Ok(Some(value));
                        }
                    } else if Self::contains(&self.pending, &state) {
                        target_occurrences = 0;
                    } else {
                        return Err(PollError::UnexpectedState {
                            state,
                            target: self.target.clone(),
                        });
                    }
                }
            }

            tracing::debug!(
                "Waiting for state to become {:?} (current: {:?})",
                self.target,
                state
            );
            last_state = state;
            wait = self.next_wait(wait);
            if !ctx.sleep(wait).await {
                return Err(self.interrupted(ctx, &last_state));
            }
        }
    }
}

pub const PROVISIONING_PENDING: &[&str] = &["Updating", "Unknown", "Creating", "Activating"];
pub const PROVISIONING_TARGET: &[&str] = &["Succeeded", "Ready"];

/// Waits until `get` reports a settled provisioning state. Objects without
/// a provisioning state count as settled.
pub async fn wait_for_provisioning<T, F, Fut>(
    ctx: &Context,
    waiter: StateWaiter,
    mut get: F,
) -> Result<T, PollError>
where
    T: ProvisioningState,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let target = waiter.target.clone();
    let result = waiter
        .wait_for_state(ctx, || {
            let pending = get();
            async move {
                let value = pending.await?;
                let state = value.provisioning_state().unwrap_or("Succeeded").to_string();
                Ok((Some(value), state))
            }
        })
        .await?;

    result.ok_or(PollError::UnexpectedState {
        state: "NotFound".to_string(),
        target,
    })
}

/// Default waiter for provisioning-state polls.
pub fn provisioning_waiter() -> StateWaiter {
    StateWaiter::new(PROVISIONING_PENDING, PROVISIONING_TARGET)
        .with_min_interval(Duration::from_secs(15))
}

/// Waits until `get` returns 404. Any other error stops the wait.
pub async fn wait_for_deletion<T, F, Fut>(
    ctx: &Context,
    waiter: StateWaiter,
    mut get: F,
) -> Result<(), PollError>
where
    T: ProvisioningState,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    waiter
        .wait_for_state(ctx, || {
            let pending = get();
            async move {
                match pending.await {
                    Ok(value) => {
                        let state = value.provisioning_state().unwrap_or("Deleting").to_string();
                        Ok((Some(value), state))
                    }
                    Err(err) if err.is_not_found() => Ok((None, "Deleted".to_string())),
                    Err(err) => Err(err),
                }
            }
        })
        .await
        .map(|_| ())
}

pub fn deletion_waiter() -> StateWaiter {
    StateWaiter::new(&["Deleting", "Succeeded", "Updating", "Ready"], &[])
        .with_min_interval(Duration::from_secs(15))
}
