//! Bounded worker pool
//!
//! Work items run on the blocking thread pool, at most `jobs` at a time.
//! Results travel over a channel to the caller, which is the only place
//! outcomes are accumulated. Cancellation is checked before every dispatch;
//! work already running is allowed to finish.

use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum TaskOutcome<R> {
    Done(R),
    /// Never dispatched
    Cancelled,
    /// Dispatched, but the worker panicked
    Panicked,
}

impl<R> TaskOutcome<R> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(jobs: usize, cancel: CancellationToken) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(jobs.max(1))),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `work` on every item; outcomes are returned in item order
    pub async fn run<T, R, F>(&self, items: Vec<T>, work: F) -> Vec<TaskOutcome<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let mut outcomes: Vec<TaskOutcome<R>> = items.iter().map(|_| TaskOutcome::Cancelled).collect();
        let mut dispatched = vec![false; items.len()];
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, R)>();
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if self.cancel.is_cancelled() {
                break;
            }

            let work = Arc::clone(&work);
            let tx = tx.clone();
            dispatched[index] = true;
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = work(item);
                // receiver lives until every task has joined
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let skipped = dispatched.iter().filter(|d| !**d).count();
        if skipped > 0 {
            log::warn!("run cancelled, {} item(s) not dispatched", skipped);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("worker failed: {}", e);
            }
        }
        while let Some((index, result)) = rx.recv().await {
            outcomes[index] = TaskOutcome::Done(result);
        }
        for (outcome, dispatched) in outcomes.iter_mut().zip(dispatched) {
            if dispatched && !outcome.is_done() {
                *outcome = TaskOutcome::Panicked;
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_outcomes_in_item_order() {
        let pool = WorkerPool::new(3, CancellationToken::new());
        let outcomes = pool
            .run((0..10).collect(), |n: u64| {
                std::thread::sleep(Duration::from_millis(10 - n));
                n * 2
            })
            .await;

        let values: Vec<u64> = outcomes
            .into_iter()
            .map(|o| match o {
                TaskOutcome::Done(v) => v,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(values, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2, CancellationToken::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

        pool.run((0..8).collect(), move |_: u32| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            r.fetch_sub(1, Ordering::SeqCst);
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let pool = WorkerPool::new(4, token);

        let outcomes = pool.run(vec![1, 2, 3], |n: i32| n).await;
        assert!(outcomes.iter().all(|o| matches!(o, TaskOutcome::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_stops_dispatch() {
        let token = CancellationToken::new();
        let pool = WorkerPool::new(1, token.clone());
        let trigger = token.clone();

        let outcomes = pool
            .run((0..5).collect(), move |n: i32| {
                if n == 1 {
                    trigger.cancel();
                }
                n
            })
            .await;

        assert!(outcomes[0].is_done());
        assert!(outcomes[1].is_done());
        assert!(outcomes[3..].iter().all(|o| matches!(o, TaskOutcome::Cancelled)));
    }

    #[tokio::test]
    async fn test_panicking_worker() {
        let pool = WorkerPool::new(2, CancellationToken::new());
        let outcomes = pool
            .run(vec![1, 2], |n: i32| {
                if n == 2 {
                    panic!("boom");
                }
                n
            })
            .await;

        assert!(outcomes[0].is_done());
        assert!(matches!(outcomes[1], TaskOutcome::Panicked));
    }
}
