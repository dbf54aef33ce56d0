//! Coalescing work queue with retry accounting
//!
//! Keys with a pending item coalesce: a second push for the same key
//! replaces the payload and keeps the queue position, so a worker never
//! processes a stale version of an object it has not seen yet. Once an
//! item is handed to a worker its key is no longer pending and a fresh
//! notification enqueues anew.
//!
//! The queue also owns the failure accounting: `fail` either re-inserts
//! the item after a backoff delay or, at the retry bound, drops it for
//! good.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

/// Failures after which an item is dropped instead of requeued
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Anything the queue can coalesce by key
pub trait QueueItem: Clone + Send + 'static {
    fn queue_key(&self) -> &str;
}

/// Per-attempt requeue delay
pub trait BackoffPolicy: Send + Sync {
    /// Delay before the `attempt`-th retry; `attempt` starts at 1
    fn delay(&self, attempt: u32) -> Duration;
}

/// Doubling delay, capped
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            max: Duration::from_secs(1000),
        }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        self.base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max)
    }
}

/// Constant delay; zero makes requeues synchronous, which tests rely on
pub struct FixedBackoff(pub Duration);

impl BackoffPolicy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// What `fail` did with the item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Re-inserted after the backoff delay for this attempt
    Requeued { attempt: u32 },

    /// Retry bound reached; the item is gone and its counter cleared
    Dropped { attempts: u32 },
}

struct State<T> {
    order: VecDeque<String>,
    items: HashMap<String, T>,
    retries: HashMap<String, u32>,
    shutdown: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    max_retries: u32,
    backoff: Arc<dyn BackoffPolicy>,
}

/// Shared handle to one queue; clones point at the same queue
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: QueueItem> WorkQueue<T> {
    pub fn new(max_retries: u32, backoff: Arc<dyn BackoffPolicy>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    order: VecDeque::new(),
                    items: HashMap::new(),
                    retries: HashMap::new(),
                    shutdown: false,
                }),
                notify: Notify::new(),
                max_retries,
                backoff,
            }),
        }
    }

    /// Enqueue, coalescing with a pending item for the same key
    ///
    /// Dropped silently after `shut_down`.
    pub fn push(&self, item: T) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.shutdown {
                return;
            }
            let key = item.queue_key().to_string();
            if state.items.insert(key.clone(), item).is_none() {
                state.order.push_back(key);
            }
        }
        self.inner.notify.notify_one();
    }

    /// Next item, blocking while the queue is empty
    ///
    /// After `shut_down` the remaining items drain, then every call
    /// returns `None`.
    pub async fn next(&self) -> Option<T> {
        loop {
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock().unwrap();
                if let Some(key) = state.order.pop_front() {
                    if let Some(item) = state.items.remove(&key) {
                        if !state.order.is_empty() {
                            self.inner.notify.notify_one();
                        }
                        return Some(item);
                    }
                    continue;
                }
                if state.shutdown {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Record a processing failure and requeue or drop the item
    pub fn fail(&self, item: T) -> FailOutcome {
        let key = item.queue_key().to_string();
        let attempt = {
            let mut state = self.inner.state.lock().unwrap();
            let counter = state.retries.entry(key.clone()).or_insert(0);
            *counter += 1;
            let attempt = *counter;
            if attempt >= self.inner.max_retries {
                state.retries.remove(&key);
            }
            attempt
        };

        if attempt >= self.inner.max_retries {
            return FailOutcome::Dropped { attempts: attempt };
        }

        let delay = self.inner.backoff.delay(attempt);
        if delay.is_zero() {
            self.push(item);
        } else {
            let queue = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                queue.push(item);
            });
        }
        FailOutcome::Requeued { attempt }
    }

    /// Clear the failure counter for a key (the success path)
    pub fn forget(&self, key: &str) {
        self.inner.state.lock().unwrap().retries.remove(key);
    }

    /// Stop accepting pushes and wake every waiter
    pub fn shut_down(&self) {
        self.inner.state.lock().unwrap().shutdown = true;
        self.inner.notify.notify_waiters();
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestItem {
        key: String,
        payload: u32,
    }

    impl QueueItem for TestItem {
        fn queue_key(&self) -> &str {
            &self.key
        }
    }

    fn item(key: &str, payload: u32) -> TestItem {
        TestItem {
            key: key.to_string(),
            payload,
        }
    }

    fn queue(max_retries: u32) -> WorkQueue<TestItem> {
        WorkQueue::new(max_retries, Arc::new(FixedBackoff(Duration::ZERO)))
    }

    #[tokio::test]
    async fn test_push_and_next_fifo() {
        let queue = queue(5);
        queue.push(item("a", 1));
        queue.push(item("b", 2));

        assert_eq!(queue.next().await, Some(item("a", 1)));
        assert_eq!(queue.next().await, Some(item("b", 2)));
    }

    #[tokio::test]
    async fn test_push_coalesces_pending_key() {
        let queue = queue(5);
        queue.push(item("a", 1));
        queue.push(item("b", 2));
        queue.push(item("a", 3));

        assert_eq!(queue.len(), 2);
        // Newest payload, original position
        assert_eq!(queue.next().await, Some(item("a", 3)));
        assert_eq!(queue.next().await, Some(item("b", 2)));
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_ends() {
        let queue = queue(5);
        queue.push(item("a", 1));
        queue.shut_down();

        assert_eq!(queue.next().await, Some(item("a", 1)));
        assert_eq!(queue.next().await, None);
    }

    #[tokio::test]
    async fn test_push_after_shutdown_is_dropped() {
        let queue = queue(5);
        queue.shut_down();
        queue.push(item("a", 1));

        assert!(queue.is_empty());
        assert_eq!(queue.next().await, None);
    }

    #[tokio::test]
    async fn test_next_wakes_waiting_task() {
        let queue = queue(5);
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };
        tokio::task::yield_now().await;

        queue.push(item("a", 1));
        assert_eq!(waiter.await.unwrap(), Some(item("a", 1)));
    }

    #[tokio::test]
    async fn test_fail_requeues_until_dropped() {
        let queue = queue(3);
        queue.push(item("a", 1));

        let popped = queue.next().await.unwrap();
        assert_eq!(queue.fail(popped), FailOutcome::Requeued { attempt: 1 });

        let popped = queue.next().await.unwrap();
        assert_eq!(queue.fail(popped), FailOutcome::Requeued { attempt: 2 });

        let popped = queue.next().await.unwrap();
        assert_eq!(queue.fail(popped), FailOutcome::Dropped { attempts: 3 });

        // Dropped items are not requeued
        queue.shut_down();
        assert_eq!(queue.next().await, None);
    }

    #[tokio::test]
    async fn test_forget_resets_counter() {
        let queue = queue(3);
        queue.push(item("a", 1));

        let popped = queue.next().await.unwrap();
        assert_eq!(queue.fail(popped), FailOutcome::Requeued { attempt: 1 });

        queue.forget("a");

        let popped = queue.next().await.unwrap();
        assert_eq!(queue.fail(popped), FailOutcome::Requeued { attempt: 1 });
    }

    #[test]
    fn test_exponential_backoff_curve() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.delay(1), Duration::from_millis(5));
        assert_eq!(backoff.delay(2), Duration::from_millis(10));
        assert_eq!(backoff.delay(3), Duration::from_millis(20));
        assert_eq!(backoff.delay(100), Duration::from_secs(1000));
    }
}
