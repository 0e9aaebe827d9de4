//! Request-scoped cancellation, deadlines and values
//!
//! Every handler receives a [`Context`] as its first argument. Operation
//! timeouts are applied by deriving a child context with
//! [`Context::with_timeout`]; long-running loops (retries, polling) check
//! [`Context::is_cancelled`] or sleep through [`Context::sleep`] so they stop
//! as soon as the deadline passes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Context {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                values: HashMap::new(),
                cancel: Arc::new(cancel),
            }),
        }
    }

    /// Derives a context that expires after `timeout`. An earlier deadline
    /// inherited from the parent always wins. Values and the cancellation
    /// signal are shared with the parent.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let requested = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < requested => parent,
            _ => requested,
        };

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                values: self.inner.values.clone(),
                cancel: Arc::clone(&self.inner.cancel),
            }),
        }
    }

    pub fn with_value<T: Send + Sync + 'static>(&self, key: &str, value: T) -> Self {
        let mut values = self.inner.values.clone();
        values.insert(key.to_string(), Arc::new(value));

        Self {
            inner: Arc::new(ContextInner {
                deadline: self.inner.deadline,
                values,
                cancel: Arc::clone(&self.inner.cancel),
            }),
        }
    }

    pub fn get_value<T>(&self, key: &str) -> Option<T>
    where
        T: Send + Sync + Clone + 'static,
    {
        self.inner
            .values
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline; `None` when the context has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|d| Instant::now() >= d)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow() || self.is_deadline_exceeded()
    }

    /// Cancels this context and every context derived from the same root.
    pub fn cancel(&self) {
        self.inner.cancel.send_replace(true);
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        let mut rx = self.inner.cancel.subscribe();
        let expiry = async {
            match self.inner.deadline {
                Some(d) => tokio::time::sleep_until(d.into()).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        loop {
            if *rx.borrow_and_update() {
                return;
            }
            tokio::select! {
                _ = &mut expiry => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        // sender is owned by the context, so this only happens at teardown
                        expiry.as_mut().await;
                        return;
                    }
                }
            }
        }
    }

    /// Sleeps for `duration` unless the context finishes first.
    /// Returns `false` when the sleep was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
            _ = self.done() => false,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_stores_and_retrieves_values() {
        let ctx = Context::new().with_value("subscription", "sub-123".to_string());

        let value: Option<String> = ctx.get_value("subscription");
        assert_eq!(value, Some("sub-123".to_string()));
        assert_eq!(ctx.get_value::<u32>("subscription"), None);
    }

    #[test]
    fn cancelled_context_cuts_sleep_short() {
        let ctx = Context::new();
        let child = ctx.with_timeout(Duration::from_secs(60));
        ctx.cancel();

        assert!(child.is_cancelled());
        assert!(!tokio_test::block_on(child.sleep(Duration::from_secs(60))));
    }

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));

        assert!(!ctx.is_cancelled());
        sleep(Duration::from_millis(80)).await;
        assert!(ctx.is_cancelled());
        assert!(ctx.is_deadline_exceeded());
    }

    #[tokio::test]
    async fn child_keeps_earlier_parent_deadline() {
        let parent = Context::new().with_timeout(Duration::from_millis(100));
        let child = parent.with_timeout(Duration::from_secs(60));

        assert_eq!(child.deadline(), parent.deadline());
        assert!(child.remaining().unwrap() <= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn manual_cancel_propagates_to_children() {
        let root = Context::new();
        let child = root.with_timeout(Duration::from_secs(60));

        assert!(!child.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
        assert!(!child.is_deadline_exceeded());
    }

    #[tokio::test]
    async fn sleep_is_cut_short_by_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        let started = Instant::now();

        let completed = ctx.sleep(Duration::from_secs(5)).await;

        assert!(!completed);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn sleep_completes_without_deadline() {
        let ctx = Context::new();
        assert!(ctx.sleep(Duration::from_millis(5)).await);
        assert!(ctx.remaining().is_none());
    }
}
