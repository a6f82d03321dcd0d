//! Concurrency limiter for scrape tasks sharing one browser session.

use std::fmt;
use std::future::Future;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{ScrapeError, ScrapeResult};

/// A task that ended in an isolated failure.
#[derive(Debug)]
pub struct TaskFailure {
    /// Position of the task in the submitted list.
    pub index: usize,
    pub label: String,
    pub error: ScrapeError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} ({}): {}", self.index, self.label, self.error)
    }
}

/// Terminal state of every task in a batch.
#[derive(Debug)]
pub struct BatchResult<T> {
    /// Successful outputs tagged with their input position, in completion order.
    pub succeeded: Vec<(usize, T)>,
    pub failed: Vec<TaskFailure>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fail the whole batch if any task hit a stage-fatal error.
    ///
    /// Extraction and timeout failures stay isolated. Anything else, such as
    /// a browser session that died or a broken event store, is returned so
    /// the stage run fails instead of completing with only failed tasks.
    pub fn check_fatal(mut self) -> ScrapeResult<Self> {
        if self.is_clean() {
            return Ok(self);
        }
        match self.failed.iter().position(|f| !f.error.is_task_local()) {
            Some(pos) => Err(self.failed.swap_remove(pos).error),
            None => Ok(self),
        }
    }

    /// Successful outputs in input order.
    pub fn into_values(mut self) -> Vec<T> {
        self.succeeded.sort_by_key(|(index, _)| *index);
        self.succeeded.into_iter().map(|(_, value)| value).collect()
    }
}

/// Caps how many tasks run at once. The cap is fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimiter {
    max: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max: usize) -> Self {
        Self { max: max.max(1) }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Run every task to a terminal state with at most `max` in flight.
    ///
    /// Tasks are admitted in input order. A failing task never cancels or
    /// blocks its siblings; its error is collected into the result instead
    /// of being returned.
    pub async fn run<T, Fut>(&self, tasks: Vec<(String, Fut)>) -> BatchResult<T>
    where
        Fut: Future<Output = Result<T, ScrapeError>>,
    {
        let semaphore = Semaphore::new(self.max);
        let total = tasks.len();

        let runs = tasks.into_iter().enumerate().map(|(index, (label, task))| {
            let semaphore = &semaphore;
            async move {
                // The semaphore is never closed while tasks hold a reference.
                let _permit = semaphore.acquire().await.ok();
                debug!(task = index, label = %label, "Task started");
                (index, label, task.await)
            }
        });

        let mut batch = BatchResult::default();
        for (index, label, outcome) in join_all(runs).await {
            match outcome {
                Ok(value) => batch.succeeded.push((index, value)),
                Err(error) => {
                    warn!(task = index, label = %label, "Task failed: {}", error);
                    batch.failed.push(TaskFailure {
                        index,
                        label,
                        error,
                    });
                }
            }
        }

        debug!(
            total,
            succeeded = batch.succeeded.len(),
            failed = batch.failed.len(),
            "Batch finished"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failure_is_isolated_and_cap_respected() {
        let limiter = ConcurrencyLimiter::new(2);
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let tasks: Vec<_> = (1..=5)
            .map(|n| {
                let in_flight = &in_flight;
                let peak = &peak;
                let task = async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    if n == 3 {
                        Err(ScrapeError::extraction(format!("/league/{}", n), "no table"))
                    } else {
                        Ok(n)
                    }
                };
                (format!("league-{}", n), task)
            })
            .collect();

        let batch = limiter.run(tasks).await;

        assert_eq!(batch.total(), 5);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].index, 2);
        assert_eq!(batch.failed[0].label, "league-3");
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(batch.into_values(), vec![1, 2, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let limiter = ConcurrencyLimiter::new(4);
        let tasks: Vec<(String, std::future::Ready<Result<(), ScrapeError>>)> = Vec::new();
        let batch = limiter.run(tasks).await;
        assert_eq!(batch.total(), 0);
        assert!(batch.is_clean());
    }

    #[tokio::test]
    async fn test_session_failure_is_fatal_to_batch() {
        let limiter = ConcurrencyLimiter::new(2);
        let tasks: Vec<_> = (1..=3)
            .map(|n| {
                let task = async move {
                    match n {
                        1 => Err(ScrapeError::extraction("/league/1", "no table")),
                        2 => Err(ScrapeError::Session("Browser session already closed".to_string())),
                        _ => Ok(n),
                    }
                };
                (format!("league-{}", n), task)
            })
            .collect();

        let batch = limiter.run(tasks).await;
        assert_eq!(batch.failed.len(), 2);

        match batch.check_fatal() {
            Err(ScrapeError::Session(message)) => assert!(message.contains("already closed")),
            other => panic!("expected session error, got {:?}", other.map(|b| b.total())),
        }
    }

    #[tokio::test]
    async fn test_isolated_failures_pass_fatal_check() {
        let limiter = ConcurrencyLimiter::new(2);
        let tasks = vec![
            ("a".to_string(), futures::future::ready(Ok(1))),
            (
                "b".to_string(),
                futures::future::ready(Err(ScrapeError::Timeout {
                    url: "/league/b".to_string(),
                    seconds: 120,
                })),
            ),
        ];

        let batch = limiter.run(tasks).await.check_fatal().unwrap();
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.into_values(), vec![1]);
    }

    #[test]
    fn test_zero_cap_is_clamped() {
        assert_eq!(ConcurrencyLimiter::new(0).max(), 1);
    }
}
