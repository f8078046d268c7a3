//! Bounded worker pool with a single result consumer.
//!
//! Jobs run as tokio tasks gated by a semaphore. Results are funnelled
//! through an mpsc channel so `on_result` is only ever called from the
//! caller's task, one result at a time.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Outcome counts for one `run_all` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Results handed to the consumer
    pub delivered: usize,
    /// Jobs that panicked and produced nothing
    pub panicked: usize,
}

/// Run `worker` over every job with at most `max_workers` in flight.
///
/// With `max_workers <= 1` jobs run one after another in input order.
/// Otherwise results arrive in completion order. A panicking job is logged
/// and skipped; the remaining jobs still run and deliver.
pub async fn run_all<J, T, W, Fut, C>(
    jobs: Vec<J>,
    worker: W,
    max_workers: usize,
    mut on_result: C,
) -> DispatchStats
where
    J: Send + 'static,
    T: Send + 'static,
    W: Fn(J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    C: FnMut(T),
{
    let mut stats = DispatchStats::default();

    if max_workers <= 1 {
        for job in jobs {
            match tokio::spawn(worker(job)).await {
                Ok(result) => {
                    on_result(result);
                    stats.delivered += 1;
                }
                Err(e) => {
                    tracing::error!("Worker task failed: {e}");
                    stats.panicked += 1;
                }
            }
        }
        return stats;
    }

    let semaphore = Arc::new(Semaphore::new(max_workers));
    let worker = Arc::new(worker);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let semaphore = semaphore.clone();
        let worker = worker.clone();
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                tracing::warn!("Dispatch semaphore closed unexpectedly");
                return;
            };
            let result = worker(job).await;
            // The receiver lives until every sender is gone
            let _ = tx.send(result);
        }));
    }
    drop(tx);

    while let Some(result) = rx.recv().await {
        on_result(result);
        stats.delivered += 1;
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Worker task failed: {e}");
            stats.panicked += 1;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_serial_preserves_order() {
        let mut out = Vec::new();
        let stats = run_all(
            vec![(1, 2), (3, 4)],
            |(a, b): (i32, i32)| async move { a + b },
            1,
            |sum| out.push(sum),
        )
        .await;

        assert_eq!(out, vec![3, 7]);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.panicked, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_parallel_delivers_every_result() {
        let mut out = BTreeSet::new();
        let stats = run_all(
            vec![50u64, 10, 20],
            |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms
            },
            3,
            |ms| {
                out.insert(ms);
            },
        )
        .await;

        assert_eq!(out, BTreeSet::from([10, 20, 50]));
        assert_eq!(stats.delivered, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_parallel_completion_order() {
        let mut out = Vec::new();
        run_all(
            vec![120u64, 5],
            |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms
            },
            2,
            |ms| out.push(ms),
        )
        .await;

        assert_eq!(out, vec![5, 120]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_in_flight_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (in_flight_w, peak_w) = (in_flight.clone(), peak.clone());

        let stats = run_all(
            (0..12).collect::<Vec<u32>>(),
            move |_| {
                let in_flight = in_flight_w.clone();
                let peak = peak_w.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            },
            3,
            |_| {},
        )
        .await;

        assert_eq!(stats.delivered, 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_job_is_isolated() {
        let mut out = BTreeSet::new();
        let stats = run_all(
            vec![1, 2, 3],
            |n: i32| async move {
                if n == 2 {
                    panic!("job two exploded");
                }
                n * 10
            },
            2,
            |v| {
                out.insert(v);
            },
        )
        .await;

        assert_eq!(out, BTreeSet::from([10, 30]));
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.panicked, 1);
    }

    #[tokio::test]
    async fn test_serial_panic_does_not_stop_later_jobs() {
        let mut out = Vec::new();
        let stats = run_all(
            vec![1, 2, 3],
            |n: i32| async move {
                if n == 1 {
                    panic!("first job exploded");
                }
                n
            },
            0,
            |v| out.push(v),
        )
        .await;

        assert_eq!(out, vec![2, 3]);
        assert_eq!(stats.panicked, 1);
    }

    #[tokio::test]
    async fn test_no_jobs() {
        let stats = run_all(Vec::<u8>::new(), |n| async move { n }, 4, |_| {}).await;
        assert_eq!(stats, DispatchStats::default());
    }
}
