use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::{
    collector::{
        discovery,
        dispatch::Phase,
        fetch,
        runner::{SpawnRunner, TaskRunner},
    },
    config::{RunConfig, RunOptions, SourceConfig},
    error::{CollectError, Result},
    metrics::METRICS,
    schema::{Category, DiscoveryEntry, ItemRecord},
    sources::{SourceRegistry, adapter::SourceAdapter},
};

/// Entry point of the collection engine.
///
/// Composes discovery and fetch into "collect every item of a
/// source". Holds the task runner used for distributed phases
/// and the registry used to resolve sources by name.
///
/// This type does NOT:
/// - Schedule runs (callers decide when)
/// - Store records (callers own the output)
/// - Retry anything (adapters retry internally if they need to)
///
#[derive(Clone)]
pub struct Collector {
    runner: Arc<dyn TaskRunner>,
    registry: SourceRegistry,
}

impl Collector {
    pub fn new(runner: Arc<dyn TaskRunner>, registry: SourceRegistry) -> Self {
        Self { runner, registry }
    }

    /// In-process collector: spawn runner, built-in sources.
    pub fn local() -> Self {
        Self::new(Arc::new(SpawnRunner), SourceRegistry::builtin())
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Collects every item of `adapter`, optionally restricted
    /// to `categories`.
    ///
    /// Each phase resolves its own config from `options` and the
    /// adapter's preferences, so discovery and fetch may differ in
    /// mode, queue and concurrency. Both configs are validated
    /// before any adapter call.
    ///
    /// FAILURE:
    /// - Any failing unit fails the run; no partial result
    pub async fn collect(
        &self,
        adapter: &Arc<dyn SourceAdapter>,
        categories: Option<&[Category]>,
        options: &RunOptions,
    ) -> Result<Vec<ItemRecord>> {
        let preferences = adapter.preferences();
        let discovery_cfg = RunConfig::resolve(Phase::Discovery, options, &preferences)?;
        let fetch_cfg = RunConfig::resolve(Phase::Fetch, options, &preferences)?;

        log::info!("Obtaining products from: {}", adapter.name());
        METRICS.runs_started.fetch_add(1, Ordering::Relaxed);

        let outcome = async {
            let entries =
                discovery::discover_locations(adapter, categories, &discovery_cfg, &self.runner)
                    .await?;
            fetch::fetch_records(adapter, &entries, &fetch_cfg, &self.runner).await
        }
        .await;

        if outcome.is_err() {
            METRICS.runs_failed.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Discovery phase on its own.
    pub async fn discover_locations(
        &self,
        adapter: &Arc<dyn SourceAdapter>,
        categories: Option<&[Category]>,
        options: &RunOptions,
    ) -> Result<Vec<DiscoveryEntry>> {
        let cfg = RunConfig::resolve(Phase::Discovery, options, &adapter.preferences())?;
        discovery::discover_locations(adapter, categories, &cfg, &self.runner).await
    }

    /// Fetch phase on its own, for entries discovered earlier.
    pub async fn fetch_records(
        &self,
        adapter: &Arc<dyn SourceAdapter>,
        entries: &[DiscoveryEntry],
        options: &RunOptions,
    ) -> Result<Vec<ItemRecord>> {
        let cfg = RunConfig::resolve(Phase::Fetch, options, &adapter.preferences())?;
        fetch::fetch_records(adapter, entries, &cfg, &self.runner).await
    }

    /// Builds the adapter named by `source` and collects it.
    ///
    /// ERRORS:
    /// - `UnknownSource` if the name is not registered
    /// - `Config` if the adapter rejected its settings
    pub async fn collect_source(&self, source: &SourceConfig) -> Result<Vec<ItemRecord>> {
        let adapter = self
            .registry
            .build(&source.name, &source.settings)
            .ok_or_else(|| CollectError::UnknownSource(source.name.clone()))?
            .map_err(|e| CollectError::Config(format!("{}: {:#}", source.name, e)))?;

        self.collect(&adapter, source.categories.as_deref(), &source.options)
            .await
    }
}
