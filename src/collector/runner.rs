use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;

use futures_util::FutureExt;
use rand::random_range;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::{
    collector::dispatch::{UnitOutput, WorkUnit},
    error::{CollectError, Result},
    metrics::METRICS,
};

/// Executes groups of independent work units.
///
/// This is the seam to whatever distributed task queue runs the
/// collection. The engine only needs it to run callables and hand
/// back their results.
///
/// CONTRACT:
/// - Every unit of the group is started
/// - `run_group` returns only after every unit has finished
/// - Outputs are returned in submission order (unit i ↔ output i),
///   regardless of completion order
/// - If any unit failed, the first failure in submission order is
///   returned and no outputs are
/// - A unit that panics, is cancelled, or cannot be submitted is
///   reported as `CollectError::Dispatch`
///
/// NOT RESPONSIBLE FOR:
/// - Retries
/// - Limiting group size (the caller chunks)
///
#[async_trait::async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_group(&self, queue: &str, units: Vec<WorkUnit>) -> Result<Vec<UnitOutput>>;
}

/// Folds the settled outcomes of a group into the runner contract.
fn settle(outcomes: Vec<Result<UnitOutput>>) -> Result<Vec<UnitOutput>> {
    let mut outputs = Vec::with_capacity(outcomes.len());
    let mut first_error = None;

    for outcome in outcomes {
        match outcome {
            Ok(output) => outputs.push(output),
            Err(e) => {
                METRICS.units_failed.fetch_add(1, Ordering::Relaxed);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outputs),
    }
}

// ------------------------------------------------------------
// SpawnRunner
// ------------------------------------------------------------
//
// Runs every unit of a group as its own tokio task on the
// current runtime. Queue names are only used for reporting.
//
#[derive(Debug, Default, Clone, Copy)]
pub struct SpawnRunner;

#[async_trait::async_trait]
impl TaskRunner for SpawnRunner {
    async fn run_group(&self, queue: &str, units: Vec<WorkUnit>) -> Result<Vec<UnitOutput>> {
        let handles: Vec<_> = units.into_iter().map(tokio::spawn).collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(CollectError::dispatch(queue, format!("unit aborted: {}", e))),
            });
        }

        settle(outcomes)
    }
}

// ------------------------------------------------------------
// QueuedRunner
// ------------------------------------------------------------
//
// Routes units to per-queue worker pools.
//
// Each derived queue name gets its own pool of workers the first
// time it is used. Discovery and fetch traffic, and different
// logical queues, never share workers.
//
// A unit goes to a randomly chosen worker of its queue; the
// result travels back over a oneshot channel.
//
struct Job {
    unit: WorkUnit,
    reply: oneshot::Sender<Result<UnitOutput>>,
}

pub struct QueuedRunner {
    workers_per_queue: usize,
    pools: Mutex<HashMap<String, Vec<mpsc::Sender<Job>>>>,
}

impl QueuedRunner {
    pub fn new(workers_per_queue: usize) -> Self {
        Self {
            workers_per_queue: workers_per_queue.max(1),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Names of the queues that have a live worker pool.
    pub async fn queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn workers(&self, queue: &str) -> Vec<mpsc::Sender<Job>> {
        let mut pools = self.pools.lock().await;

        pools
            .entry(queue.to_string())
            .or_insert_with(|| {
                log::info!("Starting {} workers for queue {}", self.workers_per_queue, queue);
                (0..self.workers_per_queue)
                    .map(|_| spawn_worker(queue.to_string()))
                    .collect()
            })
            .clone()
    }
}

/// Worker loop: runs jobs one at a time until the runner is dropped.
///
/// A panicking unit is reported to its caller; the worker survives.
fn spawn_worker(queue: String) -> mpsc::Sender<Job> {
    let (tx, mut rx) = mpsc::channel::<Job>(64);

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let outcome = match AssertUnwindSafe(job.unit).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(CollectError::dispatch(&queue, "unit panicked")),
            };

            // Caller may have gone away; nothing to do then
            let _ = job.reply.send(outcome);
        }

        log::debug!("Worker for queue {} stopped", queue);
    });

    tx
}

#[async_trait::async_trait]
impl TaskRunner for QueuedRunner {
    async fn run_group(&self, queue: &str, units: Vec<WorkUnit>) -> Result<Vec<UnitOutput>> {
        let workers = self.workers(queue).await;

        // Submit everything first, then wait: the group is one barrier
        let mut pending = Vec::with_capacity(units.len());
        for unit in units {
            let (reply, rx) = oneshot::channel();
            let worker = &workers[random_range(0..workers.len())];

            pending.push(match worker.send(Job { unit, reply }).await {
                Ok(()) => Ok(rx),
                Err(_) => Err(CollectError::dispatch(queue, "worker queue closed")),
            });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for submitted in pending {
            outcomes.push(match submitted {
                Ok(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(CollectError::dispatch(queue, "unit dropped"))),
                Err(e) => Err(e),
            });
        }

        settle(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Location;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn delayed(url: &'static str, delay_ms: u64) -> WorkUnit {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok::<_, CollectError>(UnitOutput::Locations(vec![Location::new(url)]))
        })
    }

    fn failing(reason: &'static str) -> WorkUnit {
        Box::pin(async move { Err::<UnitOutput, _>(CollectError::Config(reason.into())) })
    }

    fn urls(outputs: Vec<UnitOutput>) -> Vec<String> {
        outputs
            .into_iter()
            .flat_map(|o| match o {
                UnitOutput::Locations(l) => l,
                UnitOutput::Records(_) => Vec::new(),
            })
            .map(|l| l.to_string())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn spawn_runner_keeps_submission_order() {
        let outputs = SpawnRunner
            .run_group("q", vec![delayed("slow", 50), delayed("fast", 0)])
            .await
            .unwrap();

        assert_eq!(urls(outputs), ["slow", "fast"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queued_runner_keeps_submission_order() {
        let runner = QueuedRunner::new(3);
        let outputs = runner
            .run_group("q", vec![delayed("a", 40), delayed("b", 0), delayed("c", 20)])
            .await
            .unwrap();

        assert_eq!(urls(outputs), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn first_failure_in_submission_order_wins() {
        let err = SpawnRunner
            .run_group("q", vec![delayed("ok", 0), failing("first"), failing("second")])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "config error: first");
    }

    fn slow_flagging(done: &Arc<AtomicBool>) -> WorkUnit {
        let done = done.clone();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            done.store(true, Ordering::SeqCst);
            Ok::<_, CollectError>(UnitOutput::Records(Vec::new()))
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn group_waits_for_every_unit_after_a_failure() {
        let runners: Vec<(&str, Arc<dyn TaskRunner>)> = vec![
            ("spawn", Arc::new(SpawnRunner)),
            ("queued", Arc::new(QueuedRunner::new(2))),
        ];

        for (name, runner) in runners {
            let done = Arc::new(AtomicBool::new(false));
            let err = runner
                .run_group("q", vec![failing("fast"), slow_flagging(&done)])
                .await
                .unwrap_err();

            assert_eq!(err.to_string(), "config error: fast", "{name}");
            assert!(
                done.load(Ordering::SeqCst),
                "{name} returned before the slow unit finished"
            );
        }
    }

    #[tokio::test]
    async fn panicking_unit_is_a_dispatch_error() {
        let boom: WorkUnit = Box::pin(async {
            if true {
                panic!("adapter bug");
            }
            Ok::<_, CollectError>(UnitOutput::Records(Vec::new()))
        });

        let spawn_err = SpawnRunner.run_group("q", vec![boom]).await.unwrap_err();
        assert!(matches!(spawn_err, CollectError::Dispatch { .. }));

        let runner = QueuedRunner::new(1);
        let boom: WorkUnit = Box::pin(async {
            if true {
                panic!("adapter bug");
            }
            Ok::<_, CollectError>(UnitOutput::Records(Vec::new()))
        });
        let queued_err = runner.run_group("q", vec![boom]).await.unwrap_err();
        assert!(matches!(queued_err, CollectError::Dispatch { .. }));

        // The worker survived the panic
        let outputs = runner.run_group("q", vec![delayed("after", 0)]).await.unwrap();
        assert_eq!(urls(outputs), ["after"]);
    }

    #[tokio::test]
    async fn queued_runner_creates_one_pool_per_queue() {
        let runner = QueuedRunner::new(2);

        runner.run_group("fetch_us", vec![delayed("a", 0)]).await.unwrap();
        runner.run_group("discover_us", vec![delayed("b", 0)]).await.unwrap();
        runner.run_group("fetch_us", vec![delayed("c", 0)]).await.unwrap();

        assert_eq!(runner.queues().await, ["discover_us", "fetch_us"]);
    }
}
