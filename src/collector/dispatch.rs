use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::future::BoxFuture;

use crate::{
    collector::runner::TaskRunner,
    config::{ExecutionMode, RunConfig},
    error::Result,
    metrics::METRICS,
    schema::{ItemRecord, Location},
};

/// Fixed prefix of every derived queue name.
pub const QUEUE_PREFIX: &str = "collector";

/// The two pipeline stages.
///
/// IMPORTANT:
/// - Task names are part of derived queue names; changing them
///   reroutes traffic on existing deployments
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Categories → item locations
    Discovery,

    /// Item locations → item records
    Fetch,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Fetch => "fetch",
        }
    }

    fn task_name(&self) -> &'static str {
        match self {
            Phase::Discovery => "discover_urls_for_category",
            Phase::Fetch => "products_for_url",
        }
    }

    /// Derived queue name for this phase on logical queue `queue`.
    ///
    /// Examples:
    /// - (Discovery, "us") -> "collector_discover_urls_for_category_us"
    /// - (Fetch, "cl")     -> "collector_products_for_url_cl"
    ///
    pub fn queue_name(&self, queue: &str) -> String {
        format!("{}_{}_{}", QUEUE_PREFIX, self.task_name(), queue)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single unit of work returns.
#[derive(Debug)]
pub enum UnitOutput {
    Locations(Vec<Location>),
    Records(Vec<ItemRecord>),
}

/// One independent unit of work: a single adapter call.
///
/// Units own everything they touch so they can run on any
/// worker of the task runner.
pub type WorkUnit = BoxFuture<'static, Result<UnitOutput>>;

/// Per-phase execution target.
///
/// MODE ONLY CHANGES WHERE UNITS RUN:
/// - `Local` awaits each unit in order on the calling task
/// - `Distributed` submits a chunk as one group to the task
///   runner and waits for the whole group
///
/// Both return one output per unit, in submission order.
pub enum Dispatch {
    Local,
    Distributed {
        queue: String,
        runner: Arc<dyn TaskRunner>,
    },
}

impl Dispatch {
    pub fn new(phase: Phase, config: &RunConfig, runner: &Arc<dyn TaskRunner>) -> Self {
        match config.mode {
            ExecutionMode::Sync => Dispatch::Local,
            ExecutionMode::Distributed => Dispatch::Distributed {
                queue: phase.queue_name(&config.queue),
                runner: runner.clone(),
            },
        }
    }

    /// Derived queue name, if units leave the calling task.
    pub fn queue_name(&self) -> Option<&str> {
        match self {
            Dispatch::Local => None,
            Dispatch::Distributed { queue, .. } => Some(queue),
        }
    }

    /// Items per chunk for a phase configured with `concurrency`.
    ///
    /// Local execution handles one item at a time.
    pub fn chunk_size(&self, concurrency: usize) -> usize {
        match self {
            Dispatch::Local => 1,
            Dispatch::Distributed { .. } => concurrency,
        }
    }

    /// Runs one chunk of units and returns their outputs in order.
    ///
    /// FAILURE:
    /// - Local: stops at the first failing unit
    /// - Distributed: the runner settles the whole group, then
    ///   reports the first failure in submission order
    pub async fn run_chunk(&self, units: Vec<WorkUnit>) -> Result<Vec<UnitOutput>> {
        match self {
            Dispatch::Local => {
                let mut outputs = Vec::with_capacity(units.len());
                for unit in units {
                    match unit.await {
                        Ok(output) => outputs.push(output),
                        Err(e) => {
                            METRICS.units_failed.fetch_add(1, Ordering::Relaxed);
                            return Err(e);
                        }
                    }
                }
                Ok(outputs)
            }

            Dispatch::Distributed { queue, runner } => {
                METRICS.groups_submitted.fetch_add(1, Ordering::Relaxed);
                METRICS.units_submitted.fetch_add(units.len(), Ordering::Relaxed);

                runner.run_group(queue, units).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::runner::SpawnRunner;
    use crate::error::CollectError;
    use serde_json::Value;

    fn config(mode: ExecutionMode) -> RunConfig {
        RunConfig {
            mode,
            queue: "cl".into(),
            discovery_concurrency: 2,
            fetch_concurrency: 7,
            extra_args: Value::Null,
        }
    }

    fn unit(url: &'static str) -> WorkUnit {
        Box::pin(async move { Ok::<_, CollectError>(UnitOutput::Locations(vec![Location::new(url)])) })
    }

    #[test]
    fn queue_names_isolate_phase_and_region() {
        assert_eq!(
            Phase::Discovery.queue_name("us"),
            "collector_discover_urls_for_category_us"
        );
        assert_eq!(Phase::Fetch.queue_name("cl"), "collector_products_for_url_cl");
    }

    #[test]
    fn mode_selects_target() {
        let runner: Arc<dyn TaskRunner> = Arc::new(SpawnRunner);

        let local = Dispatch::new(Phase::Fetch, &config(ExecutionMode::Sync), &runner);
        assert!(local.queue_name().is_none());
        assert_eq!(local.chunk_size(7), 1);

        let remote = Dispatch::new(Phase::Fetch, &config(ExecutionMode::Distributed), &runner);
        assert_eq!(remote.queue_name(), Some("collector_products_for_url_cl"));
        assert_eq!(remote.chunk_size(7), 7);
    }

    #[tokio::test]
    async fn local_stops_at_first_failure() {
        let failing: WorkUnit =
            Box::pin(async { Err::<UnitOutput, _>(CollectError::Config("boom".into())) });
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let never: WorkUnit = Box::pin({
            let ran = ran.clone();
            async move {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, CollectError>(UnitOutput::Records(Vec::new()))
            }
        });

        let failed_before = METRICS.units_failed.load(Ordering::SeqCst);
        let err = Dispatch::Local
            .run_chunk(vec![unit("a"), failing, never])
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::Config(_)));
        assert!(!ran.load(Ordering::SeqCst));
        // Counters are process-wide; other tests may add to them concurrently
        assert!(METRICS.units_failed.load(Ordering::SeqCst) > failed_before);
    }

    #[tokio::test]
    async fn both_targets_return_outputs_in_order() {
        let runner: Arc<dyn TaskRunner> = Arc::new(SpawnRunner);

        for mode in [ExecutionMode::Sync, ExecutionMode::Distributed] {
            let dispatch = Dispatch::new(Phase::Discovery, &config(mode), &runner);
            let outputs = dispatch.run_chunk(vec![unit("a"), unit("b")]).await.unwrap();

            let urls: Vec<String> = outputs
                .into_iter()
                .flat_map(|o| match o {
                    UnitOutput::Locations(l) => l,
                    UnitOutput::Records(_) => Vec::new(),
                })
                .map(|l| l.to_string())
                .collect();
            assert_eq!(urls, ["a", "b"]);
        }
    }
}
